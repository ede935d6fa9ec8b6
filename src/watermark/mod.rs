//! Text watermark rendering.
//!
//! A [`WatermarkSpec`] describes the text, its style and where it goes. The
//! [`WatermarkRenderer`] decodes a source image, draws the text at every
//! placement derived from the spec's positions and re-encodes the result in
//! the source's format.
//!
//! # Features
//!
//! - **Seven positions**: four corners, center, top-bottom pair and a tiled grid
//! - **Responsive sizing**: text scales with the image once it is wider than 1500px
//! - **Rotation** about each placement's anchor, with a soft drop shadow
//! - **Pluggable surfaces**: the renderer only talks to [`RenderSurface`]
//!
//! # Configuration Example
//!
//! ```yaml
//! watermark:
//!   text: "© Example"
//!   font_size: 40
//!   color: "#ffffff"
//!   opacity: 0.4
//!   positions: [top-bottom, tile]
//!   font_family: sans-serif
//!   rotation_degrees: -30
//! ```

pub mod config;
pub mod error;
pub mod font;
pub mod layout;
pub mod raster;
pub mod renderer;
pub mod spec;
pub mod surface;

// Re-export main types for convenience
pub use config::{FontConfig, FontFiles, RenderConfig};
pub use error::{RenderError, SpecError};
pub use font::{FontError, FontRegistry};
pub use raster::{RasterProvider, RasterSurface};
pub use renderer::{RenderedImage, WatermarkRenderer};
pub use spec::{parse_color, Color, PositionTag, Positions, WatermarkSpec};
pub use surface::{RenderSurface, Shadow, SurfaceProvider, TextStyle, Transform2D};
