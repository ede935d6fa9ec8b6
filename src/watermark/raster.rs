//! CPU raster surface built on `image` and `ab_glyph`.
//!
//! Text is rasterised once per (style, text) into an upright coverage mask
//! whose origin is the text's center/middle point. Each `fill_text` call maps
//! destination pixels back through the inverse placement transform, samples
//! the mask bilinearly and blends with Porter-Duff "over". The shadow mask is
//! the fill mask blurred with a gaussian, drawn first with an image-space
//! offset.

use super::font::FontRegistry;
use super::surface::{RenderSurface, SurfaceProvider, TextStyle, Transform2D};
use super::{Color, RenderError};
use crate::codec::{decode_image, EncoderFactory, EncoderQuality, OutputFormat};
use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{GrayImage, Rgba, RgbaImage};
use std::sync::Arc;

/// Opens [`RasterSurface`]s from encoded bytes.
#[derive(Debug, Clone)]
pub struct RasterProvider {
    fonts: FontRegistry,
    max_pixels: u64,
}

impl RasterProvider {
    pub fn new(fonts: FontRegistry, max_pixels: u64) -> Self {
        Self { fonts, max_pixels }
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }
}

impl SurfaceProvider for RasterProvider {
    type Surface = RasterSurface;

    fn open(&self, source: &[u8]) -> Result<RasterSurface, RenderError> {
        let image = decode_image(source, self.max_pixels)?;
        Ok(RasterSurface::from_image(image.to_rgba8(), self.fonts.clone()))
    }
}

struct ActiveStyle {
    style: TextStyle,
    font: FontArc,
    scale: PxScale,
}

/// Coverage mask with the text's local origin at `(origin_x, origin_y)`.
struct Mask {
    coverage: GrayImage,
    origin_x: f32,
    origin_y: f32,
}

struct TextSprite {
    fill: Mask,
    shadow: Option<Mask>,
}

/// RGBA canvas holding a decoded source image.
pub struct RasterSurface {
    canvas: RgbaImage,
    fonts: FontRegistry,
    style: Option<ActiveStyle>,
    sprite: Option<(String, Arc<TextSprite>)>,
}

impl RasterSurface {
    pub fn from_image(canvas: RgbaImage, fonts: FontRegistry) -> Self {
        Self {
            canvas,
            fonts,
            style: None,
            sprite: None,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    fn active(&self) -> Result<&ActiveStyle, RenderError> {
        self.style
            .as_ref()
            .ok_or_else(|| RenderError::surface_unavailable("no text style set"))
    }

    fn sprite_for(&mut self, text: &str) -> Result<Arc<TextSprite>, RenderError> {
        if let Some((cached, sprite)) = &self.sprite {
            if cached == text {
                return Ok(Arc::clone(sprite));
            }
        }

        let active = self.active()?;
        let fill = rasterize(&active.font, active.scale, text);
        let shadow = match active.style.shadow {
            Some(shadow) if !fill.coverage.is_empty() => Some(blur_mask(&fill, shadow.blur / 2.0)),
            _ => None,
        };
        let sprite = Arc::new(TextSprite { fill, shadow });
        self.sprite = Some((text.to_string(), Arc::clone(&sprite)));
        Ok(sprite)
    }
}

impl RenderSurface for RasterSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn set_text_style(&mut self, style: &TextStyle) -> Result<(), RenderError> {
        let font = self.fonts.resolve(&style.font_family).ok_or_else(|| {
            RenderError::surface_unavailable(format!(
                "no font available for family '{}'",
                style.font_family
            ))
        })?;
        let scale = em_scale(&font, style.font_size);

        self.style = Some(ActiveStyle {
            style: style.clone(),
            font,
            scale,
        });
        self.sprite = None;
        Ok(())
    }

    fn measure_text(&mut self, text: &str) -> Result<f32, RenderError> {
        let active = self.active()?;
        let scaled = active.font.as_scaled(active.scale);

        let mut width = 0.0f32;
        let mut prev_glyph: Option<GlyphId> = None;
        for c in text.chars() {
            let glyph_id = scaled.glyph_id(c);
            if let Some(prev) = prev_glyph {
                width += scaled.kern(prev, glyph_id);
            }
            width += scaled.h_advance(glyph_id);
            prev_glyph = Some(glyph_id);
        }
        Ok(width)
    }

    fn fill_text(&mut self, text: &str, transform: &Transform2D) -> Result<(), RenderError> {
        let sprite = self.sprite_for(text)?;
        let style = self.active()?.style.clone();

        if let (Some(shadow), Some(mask)) = (style.shadow, sprite.shadow.as_ref()) {
            let offset = Transform2D::translate(shadow.offset_x, shadow.offset_y).then(transform);
            composite(&mut self.canvas, mask, &offset, shadow.color, style.alpha);
        }
        composite(&mut self.canvas, &sprite.fill, transform, style.color, style.alpha);
        Ok(())
    }

    fn encode(self, format: OutputFormat, quality: EncoderQuality) -> Result<Vec<u8>, RenderError> {
        let (width, height) = self.canvas.dimensions();
        EncoderFactory::create(format)
            .encode(self.canvas.as_raw(), width, height, quality)
            .map_err(RenderError::from)
    }
}

/// CSS font sizes are em sizes; `PxScale` is relative to ascent - descent.
fn em_scale(font: &FontArc, font_size: f32) -> PxScale {
    let scale = match font.units_per_em() {
        Some(units_per_em) if units_per_em > 0.0 => {
            font_size * font.height_unscaled() / units_per_em
        }
        _ => font_size,
    };
    PxScale::from(scale)
}

/// Rasterise `text` centered horizontally on x = 0 with its em box middle on
/// y = 0.
fn rasterize(font: &FontArc, scale: PxScale, text: &str) -> Mask {
    let scaled = font.as_scaled(scale);

    let mut width = 0.0f32;
    let mut glyphs = Vec::new();
    let mut prev_glyph: Option<GlyphId> = None;
    for c in text.chars() {
        let glyph_id = scaled.glyph_id(c);
        if let Some(prev) = prev_glyph {
            width += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, width));
        width += scaled.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }

    let start_x = -width / 2.0;
    let baseline_y = (scaled.ascent() + scaled.descent()) / 2.0;

    let outlined: Vec<_> = glyphs
        .into_iter()
        .filter_map(|(glyph_id, x)| {
            let glyph =
                glyph_id.with_scale_and_position(scale, ab_glyph::point(start_x + x, baseline_y));
            font.outline_glyph(glyph)
        })
        .collect();

    if outlined.is_empty() {
        return Mask {
            coverage: GrayImage::new(0, 0),
            origin_x: 0.0,
            origin_y: 0.0,
        };
    }

    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for glyph in &outlined {
        let bounds = glyph.px_bounds();
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    let (min_x, min_y) = (min_x.floor(), min_y.floor());
    let mask_width = (max_x.ceil() - min_x).max(1.0) as u32;
    let mask_height = (max_y.ceil() - min_y).max(1.0) as u32;

    let mut coverage = GrayImage::new(mask_width, mask_height);
    for glyph in &outlined {
        let bounds = glyph.px_bounds();
        let left = (bounds.min.x - min_x) as i64;
        let top = (bounds.min.y - min_y) as i64;
        glyph.draw(|px, py, value| {
            let x = left + px as i64;
            let y = top + py as i64;
            if x >= 0 && y >= 0 && x < mask_width as i64 && y < mask_height as i64 {
                let pixel = coverage.get_pixel_mut(x as u32, y as u32);
                // Overlapping glyphs keep the stronger coverage
                let value = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
                pixel[0] = pixel[0].max(value);
            }
        });
    }

    Mask {
        coverage,
        origin_x: -min_x,
        origin_y: -min_y,
    }
}

/// Gaussian-blurred copy of `mask`, padded so the blur is not clipped.
fn blur_mask(mask: &Mask, sigma: f32) -> Mask {
    if sigma < 0.1 {
        return Mask {
            coverage: mask.coverage.clone(),
            origin_x: mask.origin_x,
            origin_y: mask.origin_y,
        };
    }

    let pad = (sigma * 3.0).ceil() as u32 + 1;
    let (width, height) = mask.coverage.dimensions();
    let mut padded = GrayImage::new(width + 2 * pad, height + 2 * pad);
    for (x, y, pixel) in mask.coverage.enumerate_pixels() {
        padded.put_pixel(x + pad, y + pad, *pixel);
    }

    Mask {
        coverage: image::imageops::blur(&padded, sigma),
        origin_x: mask.origin_x + pad as f32,
        origin_y: mask.origin_y + pad as f32,
    }
}

/// Blend `color` through `mask` placed by `transform` onto `canvas`.
fn composite(
    canvas: &mut RgbaImage,
    mask: &Mask,
    transform: &Transform2D,
    color: Color,
    global_alpha: f32,
) {
    let alpha = color.alpha_fraction() * global_alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 || mask.coverage.is_empty() {
        return;
    }
    let Some(inverse) = transform.inverse() else {
        return;
    };

    // Device-space bounding box of the mask
    let (mask_width, mask_height) = mask.coverage.dimensions();
    let left = -mask.origin_x;
    let top = -mask.origin_y;
    let right = left + mask_width as f32;
    let bottom = top + mask_height as f32;
    let corners = [
        transform.apply(left, top),
        transform.apply(right, top),
        transform.apply(left, bottom),
        transform.apply(right, bottom),
    ];
    let (canvas_width, canvas_height) = canvas.dimensions();
    let min_x = corners.iter().map(|c| c.0).fold(f32::MAX, f32::min).floor().max(0.0);
    let min_y = corners.iter().map(|c| c.1).fold(f32::MAX, f32::min).floor().max(0.0);
    let max_x = corners
        .iter()
        .map(|c| c.0)
        .fold(f32::MIN, f32::max)
        .ceil()
        .min(canvas_width as f32);
    let max_y = corners
        .iter()
        .map(|c| c.1)
        .fold(f32::MIN, f32::max)
        .ceil()
        .min(canvas_height as f32);
    if min_x >= max_x || min_y >= max_y {
        return;
    }

    for y in min_y as u32..max_y as u32 {
        for x in min_x as u32..max_x as u32 {
            let (lx, ly) = inverse.apply(x as f32 + 0.5, y as f32 + 0.5);
            let coverage = sample(
                &mask.coverage,
                lx + mask.origin_x - 0.5,
                ly + mask.origin_y - 0.5,
            );
            if coverage <= 0.0 {
                continue;
            }
            let pixel = canvas.get_pixel_mut(x, y);
            *pixel = blend_over(*pixel, color, coverage * alpha);
        }
    }
}

/// Bilinear sample of a coverage mask in pixel-center coordinates; 0 outside.
fn sample(mask: &GrayImage, x: f32, y: f32) -> f32 {
    let (width, height) = (mask.width() as i64, mask.height() as i64);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let at = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= width || y >= height {
            0.0
        } else {
            mask.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
        }
    };

    let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
    let bottom = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Porter-Duff "over" of a solid color with coverage-scaled alpha.
fn blend_over(background: Rgba<u8>, color: Color, alpha: f32) -> Rgba<u8> {
    let fg_alpha = alpha.clamp(0.0, 1.0);
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(color.r, background[0]),
        blend_channel(color.g, background[1]),
        blend_channel(color.b, background[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}
