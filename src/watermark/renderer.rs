//! Single-image watermark rendering.
//!
//! [`WatermarkRenderer::render`] is a pure function of its inputs: decode,
//! draw the text at every placement, encode with the source's MIME type.

use super::config::RenderConfig;
use super::font::FontRegistry;
use super::layout::{
    effective_font_size, placements, tile_anchor_count, ImageDimensions, TextMetrics,
    MAX_TILE_PLACEMENTS,
};
use super::raster::RasterProvider;
use super::surface::{RenderSurface, Shadow, SurfaceProvider, TextStyle, Transform2D};
use super::{Color, PositionTag, RenderError, WatermarkSpec};
use crate::codec::{EncoderQuality, OutputFormat};
use std::fmt;

/// Shadow blur as a fraction of the effective font size.
pub const SHADOW_BLUR_RATIO: f32 = 0.15;

/// Shadow offset (both axes) as a fraction of the effective font size.
pub const SHADOW_OFFSET_RATIO: f32 = 0.05;

/// Shadow color: black at 60% alpha.
pub const SHADOW_COLOR: Color = Color {
    r: 0,
    g: 0,
    b: 0,
    a: 153,
};

/// Encoded output of one render.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub data: Vec<u8>,
    /// MIME type actually written (may differ from the source's declared type)
    pub mime_type: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Draws a [`WatermarkSpec`] onto images.
///
/// Holds no per-image state, so one renderer can be shared across threads.
pub struct WatermarkRenderer<P = RasterProvider> {
    provider: P,
    quality: EncoderQuality,
}

impl WatermarkRenderer<RasterProvider> {
    /// Raster renderer for the given render settings and fonts.
    pub fn from_config(config: &RenderConfig, fonts: FontRegistry) -> Self {
        Self::new(
            RasterProvider::new(fonts, config.max_pixels),
            EncoderQuality::with_quality(config.quality),
        )
    }
}

impl<P: SurfaceProvider> WatermarkRenderer<P> {
    pub fn new(provider: P, quality: EncoderQuality) -> Self {
        Self { provider, quality }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn quality(&self) -> EncoderQuality {
        self.quality
    }

    /// Render `spec` onto the image in `source`.
    ///
    /// The output has the source's dimensions and is encoded as `mime_type`
    /// when that is writable, otherwise as the sniffed source format, otherwise
    /// PNG. `spec` is expected to be valid ([`WatermarkSpec::validate`]).
    pub fn render(
        &self,
        source: &[u8],
        mime_type: &str,
        spec: &WatermarkSpec,
    ) -> Result<RenderedImage, RenderError> {
        let mut surface = self.provider.open(source)?;
        let (width, height) = surface.dimensions();

        if !spec.text.is_empty() {
            draw_watermark(&mut surface, &ImageDimensions::new(width, height), spec)?;
        }

        let format = OutputFormat::for_source(mime_type, source);
        let data = surface.encode(format, self.quality)?;

        Ok(RenderedImage {
            data,
            mime_type: format.content_type().to_string(),
            format,
            width,
            height,
        })
    }
}

/// Text style for a spec at an already scaled font size.
pub fn text_style(spec: &WatermarkSpec, font_size: f32) -> TextStyle {
    TextStyle {
        font_family: spec.font_family.clone(),
        font_size,
        // The color's own alpha is folded into the global alpha
        color: Color {
            a: 255,
            ..spec.color
        },
        alpha: spec.effective_alpha(),
        shadow: Some(Shadow {
            blur: font_size * SHADOW_BLUR_RATIO,
            offset_x: font_size * SHADOW_OFFSET_RATIO,
            offset_y: font_size * SHADOW_OFFSET_RATIO,
            color: SHADOW_COLOR,
        }),
    }
}

fn draw_watermark<S: RenderSurface>(
    surface: &mut S,
    image: &ImageDimensions,
    spec: &WatermarkSpec,
) -> Result<(), RenderError> {
    let font_size = effective_font_size(image, spec.font_size);
    surface.set_text_style(&text_style(spec, font_size))?;

    let text = TextMetrics {
        width: surface.measure_text(&spec.text)?,
        height: font_size,
    };
    let radians = spec.rotation_radians();

    if spec.positions.contains(PositionTag::Tile) {
        let count = tile_anchor_count(image, &text);
        if count > MAX_TILE_PLACEMENTS {
            return Err(RenderError::surface_unavailable(format!(
                "tile grid needs {} placements at font size {}px, limit is {}",
                count, font_size, MAX_TILE_PLACEMENTS
            )));
        }
    }

    for anchor in placements(&spec.positions, image, &text) {
        let transform = Transform2D::placement(anchor.x, anchor.y, radians);
        surface.fill_text(&spec.text, &transform)?;
    }
    Ok(())
}
