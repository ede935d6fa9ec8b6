// Display handle lifecycle tests

use batchmark::batch::{BatchPipeline, ImageSource, PipelineConfig, SpecEditor};
use batchmark::handles::{HandleRegistry, HandleSlot, HandleStats};
use batchmark::watermark::{FontRegistry, RenderConfig, WatermarkRenderer, WatermarkSpec};
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

#[test]
fn test_handle_ids_are_unique_and_resolvable() {
    let registry = HandleRegistry::new();
    let a = registry.acquire(Bytes::from_static(b"a"));
    let b = registry.acquire(Bytes::from_static(b"b"));

    assert_ne!(a.id(), b.id());
    assert_eq!(registry.resolve(a.id()), Some(Bytes::from_static(b"a")));
    assert_eq!(b.bytes(), Some(Bytes::from_static(b"b")));
    assert_eq!(registry.live_count(), 2);
}

#[test]
fn test_release_and_drop_both_free_the_handle() {
    let registry = HandleRegistry::new();
    let released = registry.acquire(Bytes::from_static(b"x"));
    let dropped = registry.acquire(Bytes::from_static(b"y"));
    let (released_id, dropped_id) = (released.id(), dropped.id());

    registry.release(released);
    drop(dropped);

    assert!(!registry.is_live(released_id));
    assert!(!registry.is_live(dropped_id));
    assert_eq!(registry.resolve(dropped_id), None);
    assert_eq!(
        registry.stats(),
        HandleStats {
            live: 0,
            acquired: 2,
            released: 2,
        }
    );
}

#[test]
fn test_slot_replace_keeps_exactly_one_handle() {
    let registry = HandleRegistry::new();
    let mut slot = HandleSlot::new(&registry, Bytes::from_static(b"original"));
    let first = slot.id();

    let second = slot.replace(Bytes::from_static(b"processed"));
    assert_ne!(first, second);
    assert!(!registry.is_live(first));
    assert_eq!(slot.bytes(), Some(Bytes::from_static(b"processed")));
    assert_eq!(registry.live_count(), 1);

    slot.release();
    assert_eq!(registry.live_count(), 0);
}

#[tokio::test]
async fn test_pipeline_never_leaks_handles() {
    let registry = HandleRegistry::new();
    let editor = SpecEditor::new(WatermarkSpec::with_text("")).unwrap();
    let renderer = Arc::new(WatermarkRenderer::from_config(
        &RenderConfig::default(),
        FontRegistry::new(),
    ));
    let mut pipeline = BatchPipeline::new(
        renderer,
        registry.clone(),
        editor.subscribe(),
        PipelineConfig::default(),
    );

    pipeline.enqueue(vec![
        ImageSource::new("a.png", png(8, 8), "image/png"),
        ImageSource::new("b.png", png(9, 9), "image/png"),
        ImageSource::new("c.png", b"broken".to_vec(), "image/png"),
    ]);
    assert_eq!(registry.live_count(), 3);

    // one handle per task, whatever the number of runs
    for _ in 0..3 {
        pipeline.run().await;
        assert_eq!(registry.live_count(), 3);
    }

    // each completed task now shows its processed output
    for summary in pipeline.tasks() {
        let shown = registry.resolve(summary.display_handle).unwrap();
        let task = pipeline.task(summary.id).unwrap();
        match task.output() {
            Some(output) => assert_eq!(shown, output.bytes),
            None => assert_eq!(&shown, task.source()),
        }
    }

    pipeline.clear_all();
    assert_eq!(registry.live_count(), 0);

    pipeline.enqueue(vec![ImageSource::new("d.png", png(2, 2), "image/png")]);
    drop(pipeline);
    let stats = registry.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.acquired, stats.released);
}
