//! Watermark error types.
//!
//! Defines errors that can occur while validating a watermark spec and while
//! rendering a single image.

use thiserror::Error;

/// Errors that can occur while rendering one image.
///
/// Every variant is scoped to a single image; the batch pipeline turns them
/// into a failed task and moves on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    /// The source bytes could not be decoded into a pixel buffer
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// A drawing surface (or the font it needs) could not be obtained
    #[error("Rendering surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// The rendered buffer could not be serialised
    #[error("Failed to encode to {format}: {message}")]
    Encode { format: String, message: String },

    /// Rendering did not finish within the configured per-item timeout
    #[error("Rendering timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl RenderError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn surface_unavailable(message: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(message.into())
    }

    pub fn encode(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::SurfaceUnavailable(_) => "surface_unavailable",
            Self::Encode { .. } => "encode",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Errors produced when a watermark spec is invalid.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpecError {
    #[error("font size must be a finite value greater than 0, got {0}")]
    InvalidFontSize(f32),

    #[error("opacity must be a finite value between 0.0 and 1.0, got {0}")]
    InvalidOpacity(f32),

    #[error("rotation must be a finite value between -180 and 180 degrees, got {0}")]
    InvalidRotation(f32),

    #[error("at least one position is required")]
    NoPositions,

    #[error("unknown position '{0}'")]
    UnknownPosition(String),

    #[error("invalid color '{value}': {reason}")]
    InvalidColor { value: String, reason: String },

    #[error("font family cannot be empty")]
    EmptyFontFamily,
}
