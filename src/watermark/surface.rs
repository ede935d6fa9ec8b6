//! Drawing capability used by the watermark renderer.
//!
//! The renderer never touches pixels itself. It asks a [`SurfaceProvider`] to
//! decode the source into a [`RenderSurface`], configures a [`TextStyle`],
//! draws text through per-placement transforms, then encodes the result.
//! [`super::raster`] provides the CPU implementation.

use super::{Color, RenderError};
use crate::codec::{EncoderQuality, OutputFormat};

/// 2D affine transform in canvas convention.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    /// Rotation about the origin. Positive angles turn clockwise on screen
    /// because the y axis points down.
    pub fn rotate(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self` applied after `inner`: `self.then(inner)` maps `p` to `self(inner(p))`.
    pub fn then(&self, inner: &Self) -> Self {
        Self {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    /// Translate to the anchor, then rotate about it.
    pub fn placement(x: f32, y: f32, radians: f32) -> Self {
        Self::translate(x, y).then(&Self::rotate(radians))
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse transform, or `None` for a degenerate matrix.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Drop shadow drawn beneath the text.
///
/// Offsets are in image space and are not affected by the placement rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub color: Color,
}

/// Everything a surface needs to draw the watermark text.
///
/// Text is always bold, centered horizontally on the local origin and
/// vertically on the middle of the em box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub color: Color,
    /// Global alpha applied to both the fill and the shadow.
    pub alpha: f32,
    pub shadow: Option<Shadow>,
}

/// A decoded image that text can be drawn on.
pub trait RenderSurface {
    /// Width and height of the underlying pixel buffer.
    fn dimensions(&self) -> (u32, u32);

    /// Select the font and paint used by subsequent text calls.
    ///
    /// Fails with [`RenderError::SurfaceUnavailable`] when no font can be
    /// resolved for the family.
    fn set_text_style(&mut self, style: &TextStyle) -> Result<(), RenderError>;

    /// Advance width of `text` in the current style.
    fn measure_text(&mut self, text: &str) -> Result<f32, RenderError>;

    /// Draw `text` centered on the local origin under `transform`.
    ///
    /// The transform only applies to this call.
    fn fill_text(&mut self, text: &str, transform: &Transform2D) -> Result<(), RenderError>;

    /// Serialise the buffer in `format`.
    fn encode(self, format: OutputFormat, quality: EncoderQuality) -> Result<Vec<u8>, RenderError>;
}

/// Creates surfaces from encoded image bytes.
pub trait SurfaceProvider: Send + Sync + 'static {
    type Surface: RenderSurface;

    /// Decode `source` and return a surface with the image drawn on it.
    fn open(&self, source: &[u8]) -> Result<Self::Surface, RenderError>;
}
