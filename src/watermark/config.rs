//! Renderer and font configuration types.
//!
//! ```yaml
//! render:
//!   quality: 95
//!   max_pixels: 100000000
//! fonts:
//!   default_family: sans-serif
//!   discover_system: true
//!   families:
//!     brand:
//!       regular: /opt/fonts/Brand-Regular.ttf
//!       bold: /opt/fonts/Brand-Bold.ttf
//! ```

use crate::codec::{DEFAULT_MAX_PIXELS, DEFAULT_QUALITY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Output encoding and safety limits for the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Quality for lossy formats (1-100). Lossless formats ignore it.
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Largest accepted source, in pixels (image bomb protection)
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            max_pixels: default_max_pixels(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.quality) {
            return Err(format!(
                "render.quality must be between 1 and 100, got {}",
                self.quality
            ));
        }
        if self.max_pixels == 0 {
            return Err("render.max_pixels must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_max_pixels() -> u64 {
    DEFAULT_MAX_PIXELS
}

/// Font files for one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontFiles {
    pub regular: PathBuf,
    /// Preferred face; watermark text is drawn bold when this is present.
    #[serde(default)]
    pub bold: Option<PathBuf>,
}

/// Where fonts come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontConfig {
    /// Family used when a spec names a family that is not registered
    #[serde(default = "default_family")]
    pub default_family: String,

    /// Probe well-known system font locations for sans-serif, serif and
    /// monospace faces
    #[serde(default = "default_true")]
    pub discover_system: bool,

    /// Explicit family name -> font files mapping (wins over discovery)
    #[serde(default)]
    pub families: BTreeMap<String, FontFiles>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            default_family: default_family(),
            discover_system: true,
            families: BTreeMap::new(),
        }
    }
}

impl FontConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_family.trim().is_empty() {
            return Err("fonts.default_family cannot be empty".to_string());
        }
        for (family, files) in &self.families {
            if family.trim().is_empty() {
                return Err("fonts.families contains an empty family name".to_string());
            }
            if files.regular.as_os_str().is_empty() {
                return Err(format!("fonts.families.{} has an empty 'regular' path", family));
            }
        }
        Ok(())
    }
}

fn default_family() -> String {
    "sans-serif".to_string()
}

fn default_true() -> bool {
    true
}
