//! Image encoder abstraction
//!
//! Provides a trait-based encoder system so the raster surface can write the
//! same format it was given:
//! - One encoder per output format
//! - Consistent quality settings across formats
//! - Lossless formats ignore the quality setting

use super::error::CodecError;
use super::format::OutputFormat;
use image::ImageEncoder as _;
use std::io::Cursor;

/// Default quality for lossy output, matching what browsers use for `toBlob`
pub const DEFAULT_QUALITY: u8 = 95;

/// Quality settings for image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderQuality {
    /// Quality value (1-100, where 100 is best quality)
    pub quality: u8,
}

impl Default for EncoderQuality {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

impl EncoderQuality {
    /// Create quality settings with specified quality level
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

/// Trait for image encoders
///
/// Implementations handle encoding raw RGBA pixel data to a specific format.
/// The trait is object-safe to allow dynamic dispatch.
pub trait ImageEncoder: Send + Sync {
    /// The output format this encoder produces
    fn format(&self) -> OutputFormat;

    /// Encode raw RGBA image data (4 bytes per pixel)
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<Vec<u8>, CodecError>;

    /// Check if this encoder keeps the alpha channel
    fn supports_transparency(&self) -> bool;
}

/// JPEG encoder using the image crate
pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<Vec<u8>, CodecError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;

        // JPEG doesn't support alpha
        let rgb_data = rgba_to_rgb(data);

        let mut output = Cursor::new(Vec::new());
        let encoder = ImageJpegEncoder::new_with_quality(&mut output, quality.quality);

        encoder
            .write_image(&rgb_data, width, height, image::ColorType::Rgb8)
            .map_err(|e| CodecError::encode_failed("jpeg", e.to_string()))?;

        Ok(output.into_inner())
    }

    fn supports_transparency(&self) -> bool {
        false
    }
}

/// PNG encoder using the image crate
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _quality: EncoderQuality,
    ) -> Result<Vec<u8>, CodecError> {
        use image::codecs::png::PngEncoder as ImagePngEncoder;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImagePngEncoder::new(&mut output);

        encoder
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| CodecError::encode_failed("png", e.to_string()))?;

        Ok(output.into_inner())
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// WebP encoder using the image crate
///
/// Note: The `image` crate only supports lossless WebP encoding, so the
/// quality setting has no effect.
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _quality: EncoderQuality,
    ) -> Result<Vec<u8>, CodecError> {
        use image::codecs::webp::WebPEncoder as ImageWebPEncoder;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImageWebPEncoder::new_lossless(&mut output);

        encoder
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| CodecError::encode_failed("webp", e.to_string()))?;

        Ok(output.into_inner())
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// GIF encoder using the image crate (single frame)
pub struct GifEncoder;

impl ImageEncoder for GifEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Gif
    }

    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _quality: EncoderQuality,
    ) -> Result<Vec<u8>, CodecError> {
        use image::codecs::gif::GifEncoder as ImageGifEncoder;

        let mut output = Vec::new();
        {
            let mut encoder = ImageGifEncoder::new(&mut output);
            encoder
                .encode(data, width, height, image::ColorType::Rgba8)
                .map_err(|e| CodecError::encode_failed("gif", e.to_string()))?;
        }

        Ok(output)
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    /// Create an encoder for the specified output format
    pub fn create(format: OutputFormat) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder),
            OutputFormat::Gif => Box::new(GifEncoder),
        }
    }
}

/// Convert RGBA to RGB by discarding alpha channel
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let pixel_count = rgba.len() / 4;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }

    rgb
}
