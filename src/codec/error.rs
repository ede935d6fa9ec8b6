//! Codec error types

use crate::watermark::RenderError;
use thiserror::Error;

/// Errors raised while decoding or encoding image bytes
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    /// Image data could not be recognised or decoded
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: String },

    /// Image dimensions exceed safety limits (image bomb protection)
    #[error("Image dimensions {width}x{height} ({pixels} pixels) exceed limit of {max_pixels} pixels")]
    ImageTooLarge {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    /// Encoding to the output format failed
    #[error("Failed to encode to {format}: {message}")]
    EncodeFailed { format: String, message: String },
}

impl CodecError {
    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }
}

impl From<CodecError> for RenderError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::DecodeFailed { message } => RenderError::Decode(message),
            // No surface can be allocated for an image this large
            err @ CodecError::ImageTooLarge { .. } => {
                RenderError::SurfaceUnavailable(err.to_string())
            }
            CodecError::EncodeFailed { format, message } => RenderError::Encode { format, message },
        }
    }
}
