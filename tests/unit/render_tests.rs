// Renderer tests against real pixel buffers
// Font-dependent tests return early when the host has no usable system font,
// or fail when BATCHMARK_REQUIRE_FONTS is set

use super::support::system_fonts;
use batchmark::codec::OutputFormat;
use batchmark::watermark::{
    FontRegistry, PositionTag, Positions, RenderConfig, RenderError, WatermarkRenderer,
    WatermarkSpec,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use rstest::rstest;
use std::io::Cursor;

const GRAY: [u8; 4] = [100, 100, 100, 255];

fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 60, 90])));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    buffer.into_inner()
}

fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes)
        .expect("output should decode")
        .to_rgba8()
}

fn renderer(fonts: FontRegistry) -> WatermarkRenderer {
    WatermarkRenderer::from_config(&RenderConfig::default(), fonts)
}

fn system_renderer() -> Option<WatermarkRenderer> {
    system_fonts().map(renderer)
}

fn spec(text: &str, tags: &[PositionTag]) -> WatermarkSpec {
    WatermarkSpec {
        text: text.to_string(),
        positions: Positions::new(tags.iter().copied()).unwrap(),
        ..WatermarkSpec::default()
    }
}

/// Bounding box (x0, y0, x1, y1) of pixels that differ between `a` and `b`
fn changed_bounds(a: &RgbaImage, b: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in a.enumerate_pixels() {
        if pixel != b.get_pixel(x, y) {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    bounds
}

fn region_changed(a: &RgbaImage, b: &RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) -> bool {
    (y0..y1).any(|y| (x0..x1).any(|x| a.get_pixel(x, y) != b.get_pixel(x, y)))
}

#[test]
fn test_empty_text_leaves_pixels_untouched() {
    let source = png(64, 48, GRAY);
    let rendered = renderer(FontRegistry::new())
        .render(&source, "image/png", &spec("", &[PositionTag::Tile]))
        .unwrap();

    assert_eq!(rendered.mime_type, "image/png");
    assert_eq!((rendered.width, rendered.height), (64, 48));
    assert_eq!(decode(&rendered.data), decode(&source));
}

#[test]
fn test_jpeg_source_stays_jpeg() {
    let source = jpeg(40, 30);
    let rendered = renderer(FontRegistry::new())
        .render(&source, "image/jpeg", &spec("", &[PositionTag::Center]))
        .unwrap();

    assert_eq!(rendered.format, OutputFormat::Jpeg);
    assert_eq!(rendered.mime_type, "image/jpeg");
    assert_eq!(decode(&rendered.data).dimensions(), (40, 30));
}

#[test]
fn test_unknown_mime_falls_back_to_sniffed_format() {
    let source = png(8, 8, GRAY);
    let rendered = renderer(FontRegistry::new())
        .render(&source, "image/x-unknown", &spec("", &[PositionTag::Center]))
        .unwrap();
    assert_eq!(rendered.format, OutputFormat::Png);
}

#[test]
fn test_undecodable_source_is_a_decode_error() {
    let result = renderer(FontRegistry::new()).render(
        b"definitely not an image",
        "image/png",
        &spec("TEST", &[PositionTag::Center]),
    );
    assert!(matches!(result, Err(RenderError::Decode(_))));
}

#[test]
fn test_missing_font_is_surface_unavailable() {
    let source = png(32, 32, GRAY);
    let result = renderer(FontRegistry::new()).render(
        &source,
        "image/png",
        &spec("TEST", &[PositionTag::Center]),
    );
    assert!(matches!(result, Err(RenderError::SurfaceUnavailable(_))));
}

#[test]
fn test_corner_watermarks_only_touch_their_corners() {
    let Some(renderer) = system_renderer() else {
        return;
    };
    let source = png(800, 600, GRAY);
    let mut spec = spec("TEST", &[PositionTag::TopLeft, PositionTag::BottomRight]);
    spec.opacity = 0.5;

    let rendered = renderer.render(&source, "image/png", &spec).unwrap();
    let before = decode(&source);
    let after = decode(&rendered.data);
    assert_eq!(after.dimensions(), (800, 600));

    // margin is 0.08 * 600 = 48px from each edge
    assert!(region_changed(&before, &after, 40, 10, 260, 90));
    assert!(region_changed(&before, &after, 540, 510, 760, 590));

    assert!(!region_changed(&before, &after, 540, 10, 800, 90));
    assert!(!region_changed(&before, &after, 0, 510, 260, 600));
    assert!(!region_changed(&before, &after, 200, 200, 600, 400));
}

#[test]
fn test_full_opacity_is_stronger_than_half() {
    let Some(renderer) = system_renderer() else {
        return;
    };
    let source = png(400, 200, [0, 0, 0, 255]);
    let mut half = spec("TEST", &[PositionTag::Center]);
    half.opacity = 0.5;
    let mut full = half.clone();
    full.opacity = 1.0;

    let brightest = |spec: &WatermarkSpec| {
        let out = decode(&renderer.render(&source, "image/png", spec).unwrap().data);
        out.pixels().map(|p| p[0]).max().unwrap_or(0)
    };
    assert!(brightest(&full) > brightest(&half));
}

#[test]
fn test_rendering_is_deterministic() {
    let Some(renderer) = system_renderer() else {
        return;
    };
    let source = png(300, 200, GRAY);
    let mut spec = spec("© TEST", &[PositionTag::Tile, PositionTag::Center]);
    spec.rotation_degrees = -30.0;

    let first = renderer.render(&source, "image/png", &spec).unwrap();
    let second = renderer.render(&source, "image/png", &spec).unwrap();
    assert_eq!(first.data, second.data);
}

#[test]
fn test_wide_images_scale_the_font() {
    let Some(renderer) = system_renderer() else {
        return;
    };
    let spec = spec("TEST", &[PositionTag::Center]);

    // 1500 wide is not scaled (40px); 2000x500 scales by 500/1000 (20px)
    let text_width = |width: u32, height: u32| {
        let source = png(width, height, GRAY);
        let out = decode(&renderer.render(&source, "image/png", &spec).unwrap().data);
        let (x0, _, x1, _) = changed_bounds(&decode(&source), &out).expect("text was drawn");
        (x1 - x0) as f32
    };

    let unscaled = text_width(1500, 500);
    let scaled = text_width(2000, 500);
    assert!(scaled < unscaled * 0.75, "scaled {} vs unscaled {}", scaled, unscaled);
}

/// Every window one tile period in size, anywhere on the image, holds ink.
#[rstest]
#[case(0.0)]
#[case(-30.0)]
#[case(45.0)]
fn test_tile_covers_the_whole_image(#[case] rotation: f32) {
    let Some(renderer) = system_renderer() else {
        return;
    };
    const SIDE: u32 = 600;
    let source = png(SIDE, SIDE, GRAY);
    let before = decode(&source);

    // Ink width of one placement; the advance width is at most a little wider
    let centered = renderer
        .render(&source, "image/png", &spec("TILE", &[PositionTag::Center]))
        .unwrap();
    let (x0, _, x1, _) = changed_bounds(&before, &decode(&centered.data)).expect("text was drawn");
    let ink_width = (x1 - x0 + 1) as f32;

    let mut tiled = spec("TILE", &[PositionTag::Tile]);
    tiled.rotation_degrees = rotation;
    let after = decode(&renderer.render(&source, "image/png", &tiled).unwrap().data);

    // The grid repeats every 2.5 text widths across and 4 text heights down
    let window_w = ((2.5 * ink_width * 1.2).ceil() as u32 + 4).min(SIDE);
    let window_h = ((4.0 * tiled.font_size).ceil() as u32 + 4).min(SIDE);
    for i in 0..3 {
        for j in 0..3 {
            let x = i * (SIDE - window_w) / 2;
            let y = j * (SIDE - window_h) / 2;
            assert!(
                region_changed(&before, &after, x, y, x + window_w, y + window_h),
                "no ink in {}x{} window at ({}, {}) with rotation {}",
                window_w,
                window_h,
                x,
                y,
                rotation
            );
        }
    }
}
