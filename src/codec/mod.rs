//! Image codec module
//!
//! Decodes source bytes into pixel buffers and writes rendered buffers back
//! in the source's own format:
//! - MIME type and magic-byte format detection
//! - Pixel budget check before decoding (image bomb protection)
//! - One encoder per writable format (JPEG, PNG, WebP, GIF)

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;

// Re-export commonly used types
pub use decoder::{decode_image, validate_dimensions, DEFAULT_MAX_PIXELS};
pub use encoder::{EncoderFactory, EncoderQuality, ImageEncoder, DEFAULT_QUALITY};
pub use error::CodecError;
pub use format::{mime_for_path, OutputFormat};
