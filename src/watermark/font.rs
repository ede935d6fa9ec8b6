//! Font loading and family resolution.
//!
//! Fonts are loaded once, at startup, into a [`FontRegistry`] that is cheap to
//! clone and share with every surface. Resolution follows CSS `font-family`
//! lists: `"Brand, sans-serif"` tries `Brand` first, then `sans-serif`, then
//! the registry's default family.

use super::config::FontConfig;
use ab_glyph::FontArc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading font files.
#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a usable TrueType/OpenType font")]
    InvalidFont { path: PathBuf },
}

/// Candidate (regular, bold) file pairs probed by [`FontRegistry::discover_system`].
const SYSTEM_FONTS: &[(&str, &[(&str, &str)])] = &[
    (
        "sans-serif",
        &[
            (
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
            ),
            (
                "/usr/share/fonts/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
            ),
            (
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
            ),
            (
                "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
                "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans-Bold.ttf",
            ),
            (
                "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
            ),
            (
                "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
                "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
            ),
            (
                "/System/Library/Fonts/Supplemental/Arial.ttf",
                "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
            ),
            ("C:\\Windows\\Fonts\\arial.ttf", "C:\\Windows\\Fonts\\arialbd.ttf"),
        ],
    ),
    (
        "serif",
        &[
            (
                "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf",
                "/usr/share/fonts/truetype/dejavu/DejaVuSerif-Bold.ttf",
            ),
            (
                "/usr/share/fonts/dejavu/DejaVuSerif.ttf",
                "/usr/share/fonts/dejavu/DejaVuSerif-Bold.ttf",
            ),
            (
                "/usr/share/fonts/TTF/DejaVuSerif.ttf",
                "/usr/share/fonts/TTF/DejaVuSerif-Bold.ttf",
            ),
            (
                "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSerif-Bold.ttf",
            ),
            (
                "/System/Library/Fonts/Supplemental/Times New Roman.ttf",
                "/System/Library/Fonts/Supplemental/Times New Roman Bold.ttf",
            ),
            ("C:\\Windows\\Fonts\\times.ttf", "C:\\Windows\\Fonts\\timesbd.ttf"),
        ],
    ),
    (
        "monospace",
        &[
            (
                "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
                "/usr/share/fonts/truetype/dejavu/DejaVuSansMono-Bold.ttf",
            ),
            (
                "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
                "/usr/share/fonts/dejavu/DejaVuSansMono-Bold.ttf",
            ),
            (
                "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
                "/usr/share/fonts/TTF/DejaVuSansMono-Bold.ttf",
            ),
            (
                "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationMono-Bold.ttf",
            ),
            ("C:\\Windows\\Fonts\\cour.ttf", "C:\\Windows\\Fonts\\courbd.ttf"),
        ],
    ),
];

#[derive(Clone)]
struct FontFace {
    regular: FontArc,
    bold: Option<FontArc>,
}

/// Family name -> loaded font faces.
#[derive(Clone, Default)]
pub struct FontRegistry {
    families: Arc<HashMap<String, FontFace>>,
    default_family: Option<String>,
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut families: Vec<_> = self.families.keys().collect();
        families.sort();
        f.debug_struct("FontRegistry")
            .field("families", &families)
            .field("default_family", &self.default_family)
            .finish()
    }
}

impl FontRegistry {
    /// Create an empty registry. Drawing text with it fails with
    /// `SurfaceUnavailable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration.
    ///
    /// Explicit families are loaded first and a broken file is an error.
    /// Discovery then fills in generic families that are still missing.
    pub fn from_config(config: &FontConfig) -> Result<Self, FontError> {
        let mut registry = Self::new();

        for (family, files) in &config.families {
            let regular = load_font(&files.regular)?;
            let bold = files.bold.as_deref().map(load_font).transpose()?;
            registry.register(family, regular, bold);
        }

        if config.discover_system {
            registry.discover_missing();
        }

        registry.set_default_family(&config.default_family);
        tracing::debug!(registry = ?registry, "font registry ready");
        Ok(registry)
    }

    /// Registry with whatever generic families the host provides.
    pub fn discover_system() -> Self {
        let mut registry = Self::new();
        registry.discover_missing();
        registry.set_default_family("sans-serif");
        registry
    }

    fn discover_missing(&mut self) {
        for (family, candidates) in SYSTEM_FONTS {
            if self.contains(family) {
                continue;
            }
            for (regular, bold) in candidates.iter() {
                let Ok(regular_font) = load_font(Path::new(regular)) else {
                    continue;
                };
                let bold_font = load_font(Path::new(bold)).ok();
                tracing::debug!(family = *family, path = *regular, "discovered system font");
                self.register(family, regular_font, bold_font);
                break;
            }
        }
    }

    /// Register (or replace) a family.
    pub fn register(&mut self, family: &str, regular: FontArc, bold: Option<FontArc>) {
        Arc::make_mut(&mut self.families).insert(normalize(family), FontFace { regular, bold });
    }

    /// Register a family from font files on disk.
    pub fn register_files(
        &mut self,
        family: &str,
        regular: &Path,
        bold: Option<&Path>,
    ) -> Result<(), FontError> {
        let regular = load_font(regular)?;
        let bold = bold.map(load_font).transpose()?;
        self.register(family, regular, bold);
        Ok(())
    }

    pub fn set_default_family(&mut self, family: &str) {
        self.default_family = Some(normalize(family));
    }

    pub fn contains(&self, family: &str) -> bool {
        self.families.contains_key(&normalize(family))
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Bold face for a CSS-style family list, falling back to the regular
    /// face and then to the default family.
    pub fn resolve(&self, family_list: &str) -> Option<FontArc> {
        family_list
            .split(',')
            .map(normalize)
            .filter(|name| !name.is_empty())
            .chain(self.default_family.clone())
            .find_map(|name| self.families.get(&name))
            .map(|face| face.bold.clone().unwrap_or_else(|| face.regular.clone()))
    }
}

/// Lowercase, trimmed and unquoted family name.
fn normalize(family: &str) -> String {
    family
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_ascii_lowercase()
}

fn load_font(path: &Path) -> Result<FontArc, FontError> {
    let data = std::fs::read(path).map_err(|source| FontError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FontArc::try_from_vec(data).map_err(|_| FontError::InvalidFont {
        path: path.to_path_buf(),
    })
}
