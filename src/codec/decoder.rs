//! Decoding of source bytes into a pixel buffer

use super::error::CodecError;
use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::io::Cursor;

/// Default pixel budget for a single source (100 megapixels)
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// Decode image data into a DynamicImage.
///
/// The header is read first so oversized images are rejected before any
/// pixel memory is allocated.
pub fn decode_image(data: &[u8], max_pixels: u64) -> Result<DynamicImage, CodecError> {
    let (width, height) = reader(data)?
        .into_dimensions()
        .map_err(|e| CodecError::decode_failed(e.to_string()))?;
    validate_dimensions(width, height, max_pixels)?;

    reader(data)?
        .decode()
        .map_err(|e| CodecError::decode_failed(e.to_string()))
}

/// Reject images whose pixel count exceeds the budget
pub fn validate_dimensions(width: u32, height: u32, max_pixels: u64) -> Result<(), CodecError> {
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(CodecError::ImageTooLarge {
            width,
            height,
            pixels,
            max_pixels,
        });
    }
    Ok(())
}

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, CodecError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::decode_failed(e.to_string()))
}
