//! Placement math for watermark anchors.
//!
//! Every placement is described by an anchor point: the point the text is
//! centered on (horizontally and vertically) and the point it rotates about.
//! All functions here are pure so the same image size and spec always yield
//! the same anchors.
//!
//! # Example
//!
//! ```
//! use batchmark::watermark::layout::{anchors_for, ImageDimensions, TextMetrics};
//! use batchmark::watermark::PositionTag;
//!
//! let image = ImageDimensions::new(1000, 500);
//! let text = TextMetrics { width: 200.0, height: 40.0 };
//!
//! // margin = 0.08 * 500 = 40
//! let anchors = anchors_for(PositionTag::BottomRight, &image, &text);
//! assert_eq!(anchors[0].x, 1000.0 - 40.0 - 100.0);
//! assert_eq!(anchors[0].y, 500.0 - 40.0);
//! ```

use super::{PositionTag, Positions};

/// Images wider than this get a font size proportional to their short side.
pub const RESPONSIVE_WIDTH_THRESHOLD: u32 = 1500;

/// Short-side length at which the responsive scale is exactly 1.
pub const REFERENCE_DIMENSION: f32 = 1000.0;

/// Edge margin as a fraction of the image's short side.
pub const MARGIN_RATIO: f32 = 0.08;

/// Horizontal tile step as a multiple of the text width.
pub const TILE_STEP_X: f32 = 2.5;

/// Vertical tile step as a multiple of the text height.
pub const TILE_STEP_Y: f32 = 4.0;

/// Most tile placements drawn on one image. Larger grids are refused.
pub const MAX_TILE_PLACEMENTS: u64 = 100_000;

/// Dimensions of the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of the shorter side.
    pub fn short_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// Measured extent of the watermark text at its effective size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
    /// Taken as the effective font size, not the glyph bounding box.
    pub height: f32,
}

/// An anchor point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Font size after responsive scaling.
///
/// Only images strictly wider than [`RESPONSIVE_WIDTH_THRESHOLD`] are scaled,
/// by `min(W, H) / 1000`. The jump at exactly 1500 px is intentional and kept.
pub fn effective_font_size(image: &ImageDimensions, font_size: f32) -> f32 {
    if image.width > RESPONSIVE_WIDTH_THRESHOLD {
        let scale = image.short_side() as f32 / REFERENCE_DIMENSION;
        font_size * scale
    } else {
        font_size
    }
}

/// Edge margin used by the corner and top-bottom placements.
pub fn margin(image: &ImageDimensions) -> f32 {
    MARGIN_RATIO * image.short_side() as f32
}

/// Anchors for a single position tag.
pub fn anchors_for(tag: PositionTag, image: &ImageDimensions, text: &TextMetrics) -> Vec<Anchor> {
    let w = image.width as f32;
    let h = image.height as f32;
    let margin = margin(image);
    let half_text = text.width / 2.0;

    match tag {
        PositionTag::Tile => tile_anchors(image, text),
        PositionTag::TopBottom => vec![Anchor::new(w / 2.0, margin), Anchor::new(w / 2.0, h - margin)],
        PositionTag::TopLeft => vec![Anchor::new(margin + half_text, margin)],
        PositionTag::TopRight => vec![Anchor::new(w - margin - half_text, margin)],
        PositionTag::BottomLeft => vec![Anchor::new(margin + half_text, h - margin)],
        PositionTag::BottomRight => vec![Anchor::new(w - margin - half_text, h - margin)],
        PositionTag::Center => vec![Anchor::new(w / 2.0, h / 2.0)],
    }
}

/// Anchors for the tile grid.
///
/// The grid starts one full image outside the top-left corner and runs to one
/// full image past the bottom-right corner, so rotated text still covers every
/// edge. Columns are emitted outer, rows inner. Text with zero width produces
/// no anchors.
pub fn tile_anchors(image: &ImageDimensions, text: &TextMetrics) -> Vec<Anchor> {
    let dx = TILE_STEP_X * text.width;
    let dy = TILE_STEP_Y * text.height;
    if !(dx > 0.0 && dy > 0.0) {
        return Vec::new();
    }

    let w = image.width as f32;
    let h = image.height as f32;
    let mut anchors = Vec::new();

    let mut col = 0u32;
    loop {
        let x = -w + col as f32 * dx;
        if x >= 2.0 * w {
            break;
        }
        let mut row = 0u32;
        loop {
            let y = -h + row as f32 * dy;
            if y >= 2.0 * h {
                break;
            }
            anchors.push(Anchor::new(x, y));
            row += 1;
        }
        col += 1;
    }

    anchors
}

/// Number of anchors [`tile_anchors`] yields, without building them.
pub fn tile_anchor_count(image: &ImageDimensions, text: &TextMetrics) -> u64 {
    let dx = TILE_STEP_X * text.width;
    let dy = TILE_STEP_Y * text.height;
    if !(dx > 0.0 && dy > 0.0) {
        return 0;
    }

    // The grid spans three image widths and three image heights
    let columns = (3.0 * image.width as f64 / dx as f64).ceil() as u64;
    let rows = (3.0 * image.height as f64 / dy as f64).ceil() as u64;
    columns.saturating_mul(rows)
}

/// All anchors for a position list, in draw order.
pub fn placements(positions: &Positions, image: &ImageDimensions, text: &TextMetrics) -> Vec<Anchor> {
    positions
        .iter()
        .flat_map(|tag| anchors_for(tag, image, text))
        .collect()
}
