// Batch pipeline tests with real image sources
// Font-dependent tests return early when the host has no usable system font,
// or fail when BATCHMARK_REQUIRE_FONTS is set

use super::support::system_fonts;
use batchmark::batch::{
    BatchPipeline, DirectoryWriter, ImageSource, PipelineConfig, SpecEditor, TaskStatus,
};
use batchmark::handles::HandleRegistry;
use batchmark::watermark::{
    FontRegistry, PositionTag, Positions, RenderConfig, WatermarkRenderer, WatermarkSpec,
};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes)
        .expect("output should decode")
        .to_rgba8()
}

fn spec(text: &str, tags: &[PositionTag], opacity: f32) -> WatermarkSpec {
    WatermarkSpec {
        text: text.to_string(),
        positions: Positions::new(tags.iter().copied()).unwrap(),
        opacity,
        ..WatermarkSpec::default()
    }
}

fn pipeline(fonts: FontRegistry, editor: &SpecEditor) -> BatchPipeline {
    BatchPipeline::new(
        Arc::new(WatermarkRenderer::from_config(&RenderConfig::default(), fonts)),
        HandleRegistry::new(),
        editor.subscribe(),
        PipelineConfig::default(),
    )
}

fn sources() -> Vec<ImageSource> {
    vec![
        ImageSource::new("a.png", png(320, 240, 90), "image/png"),
        ImageSource::new("b.png", png(640, 360, 150), "image/png"),
        ImageSource::new("c.png", png(200, 200, 30), "image/png"),
    ]
}

#[tokio::test]
async fn test_three_images_get_corner_watermarks() {
    let Some(fonts) = system_fonts() else {
        return;
    };
    let editor = SpecEditor::new(spec(
        "TEST",
        &[PositionTag::TopLeft, PositionTag::BottomRight],
        0.5,
    ))
    .unwrap();
    let mut pipeline = pipeline(fonts, &editor);
    let originals = sources();
    pipeline.enqueue(originals.clone());

    let report = pipeline.run().await;
    assert_eq!(report.stats.completed, 3);
    assert_eq!(report.stats.failed, 0);

    for (source, output) in originals.iter().zip(&report.outputs) {
        assert_eq!(output.status, TaskStatus::Completed);
        let before = decode(&source.bytes);
        let after = decode(output.output.as_ref().expect("completed output"));
        assert_eq!(before.dimensions(), after.dimensions());

        let (w, h) = before.dimensions();
        // the middle of the image is never touched by corner placements
        let untouched = (h / 3..2 * h / 3)
            .all(|y| (w / 3..2 * w / 3).all(|x| before.get_pixel(x, y) == after.get_pixel(x, y)));
        assert!(untouched, "{} changed outside its corners", source.name);
        assert_ne!(before, after);
    }
}

#[tokio::test]
async fn test_undecodable_source_fails_alone() {
    let editor = SpecEditor::new(spec("", &[PositionTag::Center], 0.4)).unwrap();
    let mut pipeline = pipeline(FontRegistry::new(), &editor);
    pipeline.enqueue(vec![
        ImageSource::new("good.png", png(16, 16, 200), "image/png"),
        ImageSource::new("broken.png", b"\x89PNG truncated".to_vec(), "image/png"),
        ImageSource::new("also-good.png", png(24, 8, 10), "image/png"),
    ]);

    let report = pipeline.run().await;
    assert_eq!(report.stats.total, 3);
    assert_eq!(report.stats.completed, 2);
    assert_eq!(report.stats.failed, 1);

    let tasks = pipeline.tasks();
    assert_eq!(tasks[1].status, TaskStatus::Failed);
    assert!(tasks[1].error.as_deref().unwrap_or("").contains("decode"));
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[2].status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_missing_fonts_fail_every_text_render() {
    let editor = SpecEditor::new(spec("TEST", &[PositionTag::Center], 0.4)).unwrap();
    let mut pipeline = pipeline(FontRegistry::new(), &editor);
    pipeline.enqueue(sources());

    let report = pipeline.run().await;
    assert_eq!(report.stats.failed, 3);
    assert!(report.stats.has_failures());
    assert!(pipeline.completed_outputs().is_empty());
}

#[tokio::test]
async fn test_non_image_sources_are_not_queued() {
    let editor = SpecEditor::default();
    let mut pipeline = pipeline(FontRegistry::new(), &editor);
    let ids = pipeline.enqueue(vec![
        ImageSource::new("notes.txt", b"hello".to_vec(), "text/plain"),
        ImageSource::new("photo.png", png(4, 4, 0), "IMAGE/PNG"),
    ]);

    assert_eq!(ids.len(), 1);
    assert_eq!(pipeline.len(), 1);
    assert_eq!(pipeline.tasks()[0].name, "photo.png");
}

#[tokio::test]
async fn test_rerun_produces_identical_bytes() {
    let fonts = system_fonts().unwrap_or_default();
    let text = if fonts.is_empty() { "" } else { "TEST" };
    let editor = SpecEditor::new(spec(text, &[PositionTag::Tile], 0.3)).unwrap();
    let mut pipeline = pipeline(fonts, &editor);
    pipeline.enqueue(sources());

    let first = pipeline.run().await;
    let second = pipeline.run().await;
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.outputs, second.outputs);
}

#[tokio::test]
async fn test_spec_edit_applies_to_next_run() {
    let Some(fonts) = system_fonts() else {
        return;
    };
    let editor = SpecEditor::new(spec("", &[PositionTag::Center], 0.5)).unwrap();
    let mut pipeline = pipeline(fonts, &editor);
    let source = png(300, 200, 120);
    pipeline.enqueue(vec![ImageSource::new("a.png", source.clone(), "image/png")]);

    let plain = pipeline.run().await;
    assert_eq!(
        decode(plain.outputs[0].output.as_ref().unwrap()),
        decode(&source)
    );

    editor.update(|spec| spec.text = "EDITED".to_string()).unwrap();
    let marked = pipeline.run().await;
    assert_ne!(plain.outputs[0].output, marked.outputs[0].output);
}

#[tokio::test]
async fn test_outputs_are_written_with_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let editor = SpecEditor::new(spec("", &[PositionTag::Center], 0.5)).unwrap();
    let mut pipeline =
        pipeline(FontRegistry::new(), &editor).with_writer(Arc::new(DirectoryWriter::new(&out)));
    pipeline.enqueue(vec![
        ImageSource::new("a.png", png(10, 20, 50), "image/png"),
        ImageSource::new("bad.png", b"nope".to_vec(), "image/png"),
    ]);

    pipeline.run().await;

    let written = std::fs::read(out.join("marked_a.png")).unwrap();
    assert_eq!(decode(&written).dimensions(), (10, 20));
    assert!(!out.join("marked_bad.png").exists());

    let named = pipeline.completed_outputs();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].name, "marked_a.png");
    assert_eq!(named[0].mime_type, "image/png");
    assert_eq!(named[0].bytes.as_ref(), written.as_slice());
}

#[tokio::test]
async fn test_snapshot_reflects_finished_run() {
    let editor = SpecEditor::new(spec("", &[PositionTag::Center], 0.5)).unwrap();
    let mut pipeline = pipeline(FontRegistry::new(), &editor);
    let receiver = pipeline.subscribe();
    pipeline.enqueue(sources());

    pipeline.run().await;

    let snapshot = receiver.borrow().clone();
    assert!(snapshot.stats.is_finished());
    assert_eq!(snapshot.stats.completed, 3);
    assert_eq!(snapshot.tasks.len(), 3);
    assert!(snapshot.tasks.iter().all(|t| t.output_bytes.is_some()));
    assert_eq!(snapshot.stats.progress_percent(), 100.0);
}
