//! Debounced, cancelable preview rendering
//!
//! Edits to the watermark spec arrive much faster than an image can be
//! rendered. The scheduler keeps a single pending request: a new request
//! aborts the previous timer, and a render that finishes after it has been
//! superseded is discarded. Only the latest request ever reaches the preview
//! handle.

use crate::batch::TaskId;
use crate::handles::{HandleId, HandleRegistry, HandleSlot};
use crate::watermark::{RasterProvider, SurfaceProvider, WatermarkRenderer, WatermarkSpec};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Quiet period before a preview renders
pub const DEFAULT_DEBOUNCE_MS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl PreviewConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=2000).contains(&self.debounce_ms) {
            return Err(format!(
                "preview.debounce_ms must be between 1 and 2000, got {}",
                self.debounce_ms
            ));
        }
        Ok(())
    }
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

/// What to preview
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub task_id: TaskId,
    pub source: Bytes,
    pub mime_type: String,
    pub spec: Arc<WatermarkSpec>,
}

/// Preview progress, published after every change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    Scheduled {
        task_id: TaskId,
    },
    Rendering {
        task_id: TaskId,
    },
    Ready {
        task_id: TaskId,
        handle_id: HandleId,
        width: u32,
        height: u32,
    },
    Failed {
        task_id: TaskId,
        error: String,
    },
}

impl PreviewState {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Scheduled { .. } | Self::Rendering { .. })
    }

    /// Task this state refers to; `None` when idle
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Idle => None,
            Self::Scheduled { task_id }
            | Self::Rendering { task_id }
            | Self::Ready { task_id, .. }
            | Self::Failed { task_id, .. } => Some(*task_id),
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    generation: u64,
    pending: Option<JoinHandle<()>>,
    slot: Option<HandleSlot>,
    last_ready: Option<PreviewState>,
}

struct Inner<P: SurfaceProvider> {
    renderer: Arc<WatermarkRenderer<P>>,
    registry: HandleRegistry,
    debounce: Duration,
    state: Mutex<SchedulerState>,
    published: watch::Sender<PreviewState>,
}

/// Single-slot, latest-wins preview renderer.
///
/// Must be used from within a tokio runtime.
pub struct PreviewScheduler<P: SurfaceProvider = RasterProvider> {
    inner: Arc<Inner<P>>,
}

impl<P: SurfaceProvider> Clone for PreviewScheduler<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: SurfaceProvider> PreviewScheduler<P> {
    pub fn new(
        renderer: Arc<WatermarkRenderer<P>>,
        registry: HandleRegistry,
        debounce: Duration,
    ) -> Self {
        let (published, _receiver) = watch::channel(PreviewState::Idle);
        Self {
            inner: Arc::new(Inner {
                renderer,
                registry,
                debounce,
                state: Mutex::new(SchedulerState::default()),
                published,
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Schedule a preview, replacing whatever was pending.
    pub fn request(&self, request: PreviewRequest) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        let generation = state.generation;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }

        let task_id = request.task_id;
        debug!(task_id = %task_id, generation, "preview scheduled");
        self.inner
            .published
            .send_replace(PreviewState::Scheduled { task_id });

        let inner = Arc::clone(&self.inner);
        state.pending = Some(tokio::spawn(async move {
            inner.fire(generation, request).await;
        }));
    }

    /// Drop pending work. The last ready preview stays visible.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        let shown = state.last_ready.clone().unwrap_or_default();
        self.inner.published.send_replace(shown);
    }

    /// Drop pending work and release the preview handle.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        if let Some(slot) = state.slot.take() {
            slot.release();
        }
        state.last_ready = None;
        self.inner.published.send_replace(PreviewState::Idle);
    }

    pub fn state(&self) -> PreviewState {
        self.inner.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.inner.published.subscribe()
    }

    /// Handle of the preview currently shown
    pub fn current_handle(&self) -> Option<HandleId> {
        self.inner.state.lock().slot.as_ref().map(HandleSlot::id)
    }

    /// Encoded bytes of the preview currently shown
    pub fn current_bytes(&self) -> Option<Bytes> {
        self.current_handle()
            .and_then(|id| self.inner.registry.resolve(id))
    }

    /// Re-request a preview of `task_id` every time the shared spec changes.
    ///
    /// The first preview is requested immediately. The loop ends when the
    /// spec sender is dropped.
    pub fn watch_spec(
        &self,
        mut spec: watch::Receiver<Arc<WatermarkSpec>>,
        task_id: TaskId,
        source: Bytes,
        mime_type: String,
    ) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                let current = Arc::clone(&spec.borrow_and_update());
                scheduler.request(PreviewRequest {
                    task_id,
                    source: source.clone(),
                    mime_type: mime_type.clone(),
                    spec: current,
                });
                if spec.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

impl<P: SurfaceProvider> Inner<P> {
    async fn fire(&self, generation: u64, request: PreviewRequest) {
        tokio::time::sleep(self.debounce).await;

        // Published under the lock so a newer request's Scheduled always
        // lands after this Rendering, never before it
        let task_id = request.task_id;
        {
            let state = self.state.lock();
            if state.generation != generation {
                return;
            }
            self.published
                .send_replace(PreviewState::Rendering { task_id });
        }

        let renderer = Arc::clone(&self.renderer);
        let result = tokio::task::spawn_blocking(move || {
            renderer.render(&request.source, &request.mime_type, &request.spec)
        })
        .await;

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!(task_id = %task_id, generation, "discarding superseded preview");
            return;
        }
        state.pending = None;

        let next = match result {
            Ok(Ok(rendered)) => {
                let bytes = Bytes::from(rendered.data);
                let handle_id = match state.slot.as_mut() {
                    Some(slot) => slot.replace(bytes),
                    None => {
                        let slot = HandleSlot::new(&self.registry, bytes);
                        let id = slot.id();
                        state.slot = Some(slot);
                        id
                    }
                };
                debug!(task_id = %task_id, handle = %handle_id, "preview ready");
                let ready = PreviewState::Ready {
                    task_id,
                    handle_id,
                    width: rendered.width,
                    height: rendered.height,
                };
                state.last_ready = Some(ready.clone());
                ready
            }
            Ok(Err(error)) => {
                warn!(task_id = %task_id, kind = error.kind(), error = %error, "preview render failed");
                PreviewState::Failed {
                    task_id,
                    error: error.to_string(),
                }
            }
            Err(join_error) => {
                warn!(task_id = %task_id, error = %join_error, "preview worker failed");
                PreviewState::Failed {
                    task_id,
                    error: join_error.to_string(),
                }
            }
        };
        self.published.send_replace(next);
    }
}
