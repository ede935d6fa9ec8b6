//! Shared, validated watermark spec

use crate::watermark::{SpecError, WatermarkSpec};
use std::sync::Arc;
use tokio::sync::watch;

/// Owner of the current [`WatermarkSpec`].
///
/// Edits replace the whole spec. Readers hold a `watch::Receiver` and always
/// see either the previous or the new spec, never a mix.
#[derive(Debug)]
pub struct SpecEditor {
    sender: watch::Sender<Arc<WatermarkSpec>>,
}

impl SpecEditor {
    /// Start from a validated spec.
    pub fn new(spec: WatermarkSpec) -> Result<Self, SpecError> {
        spec.validate()?;
        let (sender, _receiver) = watch::channel(Arc::new(spec));
        Ok(Self { sender })
    }

    pub fn current(&self) -> Arc<WatermarkSpec> {
        Arc::clone(&self.sender.borrow())
    }

    /// Replace the spec. Invalid specs are rejected and the current one kept.
    pub fn set(&self, spec: WatermarkSpec) -> Result<(), SpecError> {
        spec.validate()?;
        tracing::debug!(text = %spec.text, positions = spec.positions.len(), "watermark spec updated");
        self.sender.send_replace(Arc::new(spec));
        Ok(())
    }

    /// Edit a copy of the current spec and install it if it validates.
    pub fn update(&self, edit: impl FnOnce(&mut WatermarkSpec)) -> Result<(), SpecError> {
        let mut spec = (*self.current()).clone();
        edit(&mut spec);
        self.set(spec)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WatermarkSpec>> {
        self.sender.subscribe()
    }
}

impl Default for SpecEditor {
    fn default() -> Self {
        let (sender, _receiver) = watch::channel(Arc::new(WatermarkSpec::default()));
        Self { sender }
    }
}
