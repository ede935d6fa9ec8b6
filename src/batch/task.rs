//! Queue entries and their state machine

use crate::handles::{HandleId, HandleRegistry, HandleSlot};
use crate::watermark::{RenderError, RenderedImage};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Unique, monotonically assigned task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// One input image: a name, its bytes and the declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub name: String,
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImageSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Whether the declared type is an image type at all
    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .get(..6)
            .map(|prefix| prefix.eq_ignore_ascii_case("image/"))
            .unwrap_or(false)
    }
}

/// Status projection of [`TaskState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded watermarked image
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub bytes: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for ProcessedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedImage")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl From<RenderedImage> for ProcessedImage {
    fn from(rendered: RenderedImage) -> Self {
        Self {
            bytes: Bytes::from(rendered.data),
            mime_type: rendered.mime_type,
            width: rendered.width,
            height: rendered.height,
        }
    }
}

/// Where a task is in its lifecycle. The output exists only once completed.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Pending,
    Processing,
    Completed { output: ProcessedImage },
    Failed { error: RenderError },
}

impl TaskState {
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Processing => TaskStatus::Processing,
            Self::Completed { .. } => TaskStatus::Completed,
            Self::Failed { .. } => TaskStatus::Failed,
        }
    }
}

/// A queued image.
///
/// The task owns exactly one display handle: the original bytes until a
/// render completes, then the latest processed output.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    name: String,
    mime_type: String,
    source: Bytes,
    state: TaskState,
    display: HandleSlot,
    write_error: Option<String>,
}

impl Task {
    pub(crate) fn new(id: TaskId, source: ImageSource, registry: &HandleRegistry) -> Self {
        let display = HandleSlot::new(registry, source.bytes.clone());
        Self {
            id,
            name: source.name,
            mime_type: source.mime_type,
            source: source.bytes,
            state: TaskState::Pending,
            display,
            write_error: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size (the source's byte length)
    pub fn size_bytes(&self) -> u64 {
        self.source.len() as u64
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &Bytes {
        &self.source
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn output(&self) -> Option<&ProcessedImage> {
        match &self.state {
            TaskState::Completed { output } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RenderError> {
        match &self.state {
            TaskState::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn display_handle(&self) -> HandleId {
        self.display.id()
    }

    pub fn write_error(&self) -> Option<&str> {
        self.write_error.as_deref()
    }

    pub(crate) fn reset(&mut self) {
        self.state = TaskState::Pending;
        self.write_error = None;
    }

    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.status(), TaskStatus::Pending);
        self.state = TaskState::Processing;
    }

    pub(crate) fn complete(&mut self, output: ProcessedImage) {
        self.display.replace(output.bytes.clone());
        self.state = TaskState::Completed { output };
    }

    pub(crate) fn fail(&mut self, error: RenderError) {
        self.state = TaskState::Failed { error };
    }

    pub(crate) fn set_write_error(&mut self, error: String) {
        self.write_error = Some(error);
    }

    /// Release the display handle and drop the task.
    pub(crate) fn release(self) {
        self.display.release();
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            name: self.name.clone(),
            size_bytes: self.size_bytes(),
            mime_type: self.mime_type.clone(),
            status: self.status(),
            display_handle: self.display_handle(),
            output_bytes: self.output().map(|output| output.bytes.len() as u64),
            error: self.error().map(ToString::to_string),
            write_error: self.write_error.clone(),
        }
    }
}

/// Read-only view of a task, as published to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub status: TaskStatus,
    pub display_handle: HandleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_error: Option<String>,
}
