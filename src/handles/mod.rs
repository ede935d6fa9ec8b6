//! Display handle lifecycle
//!
//! Every image buffer that is shown to a user (original, preview, processed
//! output) is registered here and referenced by a [`HandleId`]. A
//! [`DisplayHandle`] owns its registration: it cannot be cloned, `release`
//! consumes it, and dropping it releases it. The registry therefore never
//! holds a buffer nobody owns, and a buffer is never released twice.
//!
//! - `HandleRegistry`: shared table of live buffers
//! - `DisplayHandle`: owned-once registration
//! - `HandleSlot`: exactly one live handle, swapped acquire-then-release

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of a registered display buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(u64);

impl HandleId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Registry counters, used to check for leaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandleStats {
    /// Handles currently registered
    pub live: usize,
    /// Handles ever acquired
    pub acquired: u64,
    /// Handles ever released
    pub released: u64,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<HandleId, Bytes>,
    acquired: u64,
    released: u64,
}

/// Shared table of live display buffers.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return the handle that owns the registration.
    pub fn acquire(&self, bytes: Bytes) -> DisplayHandle {
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = HandleId(inner.next_id);
            inner.live.insert(id, bytes);
            inner.acquired += 1;
            id
        };

        tracing::trace!(handle = %id, "display handle acquired");
        DisplayHandle {
            id,
            registry: self.clone(),
            released: false,
        }
    }

    /// Release a handle obtained from this registry.
    ///
    /// # Panics
    ///
    /// Panics if the handle belongs to a different registry.
    pub fn release(&self, handle: DisplayHandle) {
        if !Arc::ptr_eq(&self.inner, &handle.registry.inner) {
            panic!("{} was not acquired from this registry", handle.id);
        }
        handle.release();
    }

    /// Bytes behind a live handle
    pub fn resolve(&self, id: HandleId) -> Option<Bytes> {
        self.inner.lock().live.get(&id).cloned()
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.inner.lock().live.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn stats(&self) -> HandleStats {
        let inner = self.inner.lock();
        HandleStats {
            live: inner.live.len(),
            acquired: inner.acquired,
            released: inner.released,
        }
    }

    fn release_id(&self, id: HandleId) {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.live.remove(&id);
            if removed.is_some() {
                inner.released += 1;
            }
            removed
        };

        if removed.is_none() {
            panic!("release of untracked display handle {}", id);
        }
        tracing::trace!(handle = %id, "display handle released");
    }
}

/// Owned registration of one display buffer.
///
/// Not `Clone`: exactly one owner can release it.
pub struct DisplayHandle {
    id: HandleId,
    registry: HandleRegistry,
    released: bool,
}

impl DisplayHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Bytes behind this handle. Always present while the handle is alive.
    pub fn bytes(&self) -> Option<Bytes> {
        self.registry.resolve(self.id)
    }

    /// Release the registration.
    pub fn release(mut self) {
        self.released = true;
        self.registry.release_id(self.id);
    }
}

impl fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DisplayHandle").field(&self.id).finish()
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(handle = %self.id, "display handle dropped without explicit release");
            self.released = true;
            self.registry.release_id(self.id);
        }
    }
}

/// Holder of exactly one live display handle.
#[derive(Debug)]
pub struct HandleSlot {
    handle: DisplayHandle,
}

impl HandleSlot {
    pub fn new(registry: &HandleRegistry, bytes: Bytes) -> Self {
        Self {
            handle: registry.acquire(bytes),
        }
    }

    pub fn id(&self) -> HandleId {
        self.handle.id()
    }

    pub fn bytes(&self) -> Option<Bytes> {
        self.handle.bytes()
    }

    /// Point the slot at new bytes. The new handle is acquired before the
    /// previous one is released, so the slot is never empty.
    pub fn replace(&mut self, bytes: Bytes) -> HandleId {
        let next = self.handle.registry.acquire(bytes);
        let previous = std::mem::replace(&mut self.handle, next);
        previous.release();
        self.handle.id()
    }

    /// Release the slot's handle.
    pub fn release(self) {
        self.handle.release();
    }
}
