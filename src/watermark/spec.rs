//! Watermark spec: the full set of parameters applied to a batch run.
//!
//! A [`WatermarkSpec`] is an immutable value. Editing the watermark means
//! building a new spec and replacing the old one wholesale, which is what lets
//! the pipeline and the preview scheduler share it through a watch channel
//! without ever observing a half-edited value.
//!
//! # Configuration Example
//!
//! ```yaml
//! watermark:
//!   text: "Copyright 2025"
//!   font_size: 40
//!   color: "#ffffff"
//!   opacity: 0.4
//!   positions: [top-left, bottom-right]
//!   font_family: sans-serif
//!   rotation_degrees: -30
//! ```

use super::SpecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a watermark placement goes on the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionTag {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    /// Centered horizontally, once near the top edge and once near the bottom edge
    TopBottom,
    /// Repeating grid covering the whole image
    Tile,
}

impl PositionTag {
    pub const ALL: [PositionTag; 7] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::Center,
        Self::TopBottom,
        Self::Tile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Center => "center",
            Self::TopBottom => "top-bottom",
            Self::Tile => "tile",
        }
    }
}

impl fmt::Display for PositionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionTag {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == wanted)
            .ok_or_else(|| SpecError::UnknownPosition(s.to_string()))
    }
}

/// Non-empty, duplicate-free list of positions in insertion order.
///
/// Insertion order is draw order. Only tile combined with a point placement
/// can overlap, in which case the last-drawn placement wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PositionTag>", into = "Vec<PositionTag>")]
pub struct Positions(Vec<PositionTag>);

impl Positions {
    /// Build a position list, dropping repeated tags (first occurrence wins).
    pub fn new(tags: impl IntoIterator<Item = PositionTag>) -> Result<Self, SpecError> {
        let mut unique = Vec::new();
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        if unique.is_empty() {
            return Err(SpecError::NoPositions);
        }
        Ok(Self(unique))
    }

    pub fn single(tag: PositionTag) -> Self {
        Self(vec![tag])
    }

    pub fn iter(&self) -> impl Iterator<Item = PositionTag> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: PositionTag) -> bool {
        self.0.contains(&tag)
    }
}

impl TryFrom<Vec<PositionTag>> for Positions {
    type Error = SpecError;

    fn try_from(tags: Vec<PositionTag>) -> Result<Self, Self::Error> {
        Self::new(tags)
    }
}

impl From<Positions> for Vec<PositionTag> {
    fn from(positions: Positions) -> Self {
        positions.0
    }
}

/// Parsed RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// White color.
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Black color.
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Alpha channel as a fraction in `[0, 1]`.
    pub fn alpha_fraction(&self) -> f32 {
        self.a as f32 / 255.0
    }

    /// `#RRGGBB` when opaque, `#RRGGBBAA` otherwise.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::white()
    }
}

impl FromStr for Color {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_color(s)
    }
}

impl TryFrom<String> for Color {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_color(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Parse a color string.
///
/// Supports `#RGB`, `#RRGGBB`, `#RRGGBBAA`, `rgb(r, g, b)` and
/// `rgba(r, g, b, a)` where `a` is a fraction in `[0, 1]`.
///
/// # Examples
///
/// ```
/// use batchmark::watermark::{parse_color, Color};
///
/// assert_eq!(parse_color("#FFF").unwrap(), Color::new(255, 255, 255));
/// assert_eq!(parse_color("rgba(0, 0, 0, 0.5)").unwrap(), Color::with_alpha(0, 0, 0, 128));
/// ```
pub fn parse_color(value: &str) -> Result<Color, SpecError> {
    let trimmed = value.trim();
    let invalid = |reason: &str| SpecError::InvalidColor {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if let Some(hex) = trimmed.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("invalid hex digit"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid("invalid hex digit"))
        };
        return match hex.len() {
            3 => {
                // Each digit is doubled: 0xF -> 0xFF, 0xA -> 0xAA
                let r = channel(0..1)?;
                let g = channel(1..2)?;
                let b = channel(2..3)?;
                Ok(Color::new(r * 17, g * 17, b * 17))
            }
            6 => Ok(Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Color::with_alpha(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            n => Err(invalid(&format!(
                "expected #RGB, #RRGGBB or #RRGGBBAA, got {} hex digits",
                n
            ))),
        };
    }

    let lower = trimmed.to_ascii_lowercase();
    let (args, with_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
        (rest, true)
    } else if let Some(rest) = lower.strip_prefix("rgb(") {
        (rest, false)
    } else {
        return Err(invalid("expected a hex color or rgb()/rgba()"));
    };
    let args = args
        .strip_suffix(')')
        .ok_or_else(|| invalid("missing closing parenthesis"))?;
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();

    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return Err(invalid(&format!(
            "expected {} components, got {}",
            expected,
            parts.len()
        )));
    }

    let channel = |s: &str| s.parse::<u8>().map_err(|_| invalid("channel must be 0-255"));
    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = if with_alpha {
        let alpha: f32 = parts[3]
            .parse()
            .map_err(|_| invalid("alpha must be a number"))?;
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(invalid("alpha must be between 0 and 1"));
        }
        (alpha * 255.0).round() as u8
    } else {
        255
    };

    Ok(Color::with_alpha(r, g, b, a))
}

fn default_text() -> String {
    "Watermark".to_string()
}

fn default_font_size() -> f32 {
    40.0
}

fn default_opacity() -> f32 {
    0.4
}

fn default_positions() -> Positions {
    Positions::single(PositionTag::TopBottom)
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

/// Full set of watermark parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    /// Text to draw. Empty text renders nothing.
    #[serde(default = "default_text")]
    pub text: String,

    /// Logical font size in pixels, before responsive scaling.
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    #[serde(default)]
    pub color: Color,

    /// Global alpha applied to the text and its shadow (0.0 to 1.0).
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    #[serde(default = "default_positions")]
    pub positions: Positions,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Rotation about each placement's anchor, in degrees (clockwise on screen).
    #[serde(default)]
    pub rotation_degrees: f32,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: default_text(),
            font_size: default_font_size(),
            color: Color::default(),
            opacity: default_opacity(),
            positions: default_positions(),
            font_family: default_font_family(),
            rotation_degrees: 0.0,
        }
    }
}

impl WatermarkSpec {
    /// Create a spec with the given text and defaults for everything else.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Validate the spec.
    pub fn validate(&self) -> Result<(), SpecError> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(SpecError::InvalidFontSize(self.font_size));
        }

        // Check for NaN/Infinity and valid range
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(SpecError::InvalidOpacity(self.opacity));
        }

        if !self.rotation_degrees.is_finite() || !(-180.0..=180.0).contains(&self.rotation_degrees)
        {
            return Err(SpecError::InvalidRotation(self.rotation_degrees));
        }

        if self.positions.is_empty() {
            return Err(SpecError::NoPositions);
        }

        if self.font_family.trim().is_empty() {
            return Err(SpecError::EmptyFontFamily);
        }

        Ok(())
    }

    /// Rotation converted to radians.
    pub fn rotation_radians(&self) -> f32 {
        self.rotation_degrees.to_radians()
    }

    /// Effective alpha: spec opacity scaled by the color's own alpha.
    pub fn effective_alpha(&self) -> f32 {
        (self.opacity * self.color.alpha_fraction()).clamp(0.0, 1.0)
    }
}
