#![allow(clippy::unwrap_used)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{ImageFormat, Rgba, RgbaImage};

use super::*;
use crate::canvas::{CompositeOp, CpuRasterizer, BLACK, RED, WHITE};
use crate::ingest::decode_base64_image;
use crate::store::{I2iSource, MemoryInputSink, MemorySessionStore, SessionState};

struct Fixture {
    session: CanvasSession,
    store: Arc<MemorySessionStore>,
    sink: Arc<MemoryInputSink>,
}

fn fixture() -> Fixture {
    fixture_with_store(MemorySessionStore::new())
}

fn fixture_with_store(store: MemorySessionStore) -> Fixture {
    let store = Arc::new(store);
    let sink = Arc::new(MemoryInputSink::new());
    let session = CanvasSession::new(EditorConfig::default(), store.clone(), sink.clone());
    Fixture {
        session,
        store,
        sink,
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    png_bytes_filled(width, height, [90, 140, 60, 255])
}

fn png_bytes_filled(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn loaded(width: u32, height: u32) -> Fixture {
    let mut f = fixture();
    f.session
        .load_image(ImageSource::File(png_bytes(width, height)), LoadOptions::default())
        .unwrap();
    f
}

fn stroke_at(session: &CanvasSession, x: f32) -> StrokePath {
    StrokePath::new(
        vec![PathPoint::new(x, 40.0), PathPoint::new(x, 120.0)],
        20.0,
        session.brush().color(),
    )
}

fn blank_mask(width: u32, height: u32) -> RgbaImage {
    Layer::mask(width, height).render(&CpuRasterizer).clone()
}

fn visible_paths(session: &CanvasSession) -> Vec<crate::canvas::PathObject> {
    session
        .surface()
        .unwrap()
        .layer(LayerKind::VisibleMask)
        .unwrap()
        .paths()
        .to_vec()
}

#[test]
fn upload_stroke_undo_export() {
    let mut f = loaded(1200, 800);
    assert_eq!((f.session.width(), f.session.height()), (768, 512));
    assert!(f.session.is_drawable());

    let path = stroke_at(&f.session, 100.0);
    f.session.commit(path).unwrap().unwrap();
    assert_eq!(f.session.history().performed().len(), 1);
    assert_eq!(f.session.mask_raster().unwrap().get_pixel(100, 80).0, WHITE);

    assert!(f.session.undo());
    assert_eq!(f.session.history().performed().len(), 0);
    assert_eq!(f.session.history().undone().len(), 1);

    let payload = f.session.export_payload().unwrap();
    assert_eq!((payload.width, payload.height), (768, 512));
    assert_eq!(decode_base64_image(&payload.mask).unwrap(), blank_mask(768, 512));
}

#[test]
fn undo_then_redo_restores_identical_pixels() {
    let mut f = loaded(512, 512);
    for (i, x) in [60.0, 90.0, 200.0, 95.0, 300.0].into_iter().enumerate() {
        if i == 3 {
            f.session.toggle_mode();
        }
        let path = stroke_at(&f.session, x);
        f.session.commit(path).unwrap();
    }
    let mask_before = f.session.mask_raster().unwrap();
    let frame_before = f.session.render().unwrap().clone();

    for _ in 0..3 {
        assert!(f.session.undo());
    }
    assert_ne!(f.session.mask_raster().unwrap(), mask_before);
    for _ in 0..3 {
        assert!(f.session.redo().unwrap());
    }

    assert_eq!(f.session.mask_raster().unwrap(), mask_before);
    assert_eq!(f.session.render().unwrap(), &frame_before);
    assert_eq!(f.session.history().performed().len(), 5);
    assert!(f.session.history().undone().is_empty());
}

#[test]
fn commit_after_undo_discards_redo_branch() {
    let mut f = loaded(256, 256);
    for x in [20.0, 60.0] {
        let path = stroke_at(&f.session, x);
        f.session.commit(path).unwrap();
    }
    f.session.undo();
    assert!(f.session.history().can_redo());

    let path = stroke_at(&f.session, 100.0);
    f.session.commit(path).unwrap();
    assert!(!f.session.history().can_redo());
    assert!(!f.session.redo().unwrap());
}

#[test]
fn empty_undo_redo_change_nothing() {
    let mut f = loaded(256, 256);
    let mask_before = f.session.mask_raster().unwrap();
    let frame_before = f.session.render().unwrap().clone();

    assert!(!f.session.undo());
    assert!(!f.session.redo().unwrap());

    assert_eq!(f.session.mask_raster().unwrap(), mask_before);
    assert_eq!(f.session.render().unwrap(), &frame_before);
}

#[test]
fn toggle_round_trip_restores_paint() {
    let mut f = loaded(256, 256);

    assert_eq!(f.session.toggle_mode(), DrawMode::Erase);
    assert_eq!(f.session.brush().color(), RED);
    let path = stroke_at(&f.session, 40.0);
    f.session.commit(path).unwrap();

    assert_eq!(f.session.toggle_mode(), DrawMode::Paint);
    assert_eq!(f.session.brush().color(), WHITE);
    let path = stroke_at(&f.session, 80.0);
    f.session.commit(path).unwrap();

    let composites: Vec<_> = visible_paths(&f.session)
        .iter()
        .map(|p| p.composite)
        .collect();
    assert_eq!(
        composites,
        vec![CompositeOp::DestinationOut, CompositeOp::SourceOver]
    );
}

#[test]
fn erase_paints_black_on_export_mask() {
    let mut f = loaded(256, 256);
    let path = stroke_at(&f.session, 50.0);
    f.session.commit(path).unwrap();
    assert_eq!(f.session.mask_raster().unwrap().get_pixel(50, 80).0, WHITE);

    f.session.toggle_mode();
    let path = stroke_at(&f.session, 50.0);
    f.session.commit(path).unwrap();

    let mask = f.session.mask_raster().unwrap();
    assert_eq!(mask.get_pixel(50, 80).0, BLACK);
    assert!(f
        .session
        .mask_layer()
        .unwrap()
        .paths()
        .iter()
        .all(|p| p.composite == CompositeOp::SourceOver));
}

#[test]
fn redo_replays_recorded_mode() {
    let mut f = loaded(256, 256);
    f.session.toggle_mode();
    let path = stroke_at(&f.session, 40.0);
    f.session.commit(path).unwrap();
    f.session.undo();

    f.session.toggle_mode();
    assert_eq!(f.session.mode(), DrawMode::Paint);
    f.session.redo().unwrap();

    let paths = visible_paths(&f.session);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].composite, CompositeOp::DestinationOut);
    assert_eq!(f.session.mask_layer().unwrap().paths()[0].path.color, BLACK);
}

#[test]
fn fresh_export_mask_is_blank() {
    let mut f = loaded(300, 600);
    assert_eq!((f.session.width(), f.session.height()), (384, 768));

    let payload = f.session.export_payload().unwrap();
    assert!(!payload.image.is_empty());
    let image = decode_base64_image(&payload.image).unwrap();
    assert_eq!(image.dimensions(), (384, 768));
    assert_eq!(decode_base64_image(&payload.mask).unwrap(), blank_mask(384, 768));
}

#[test]
fn strokes_are_ignored_without_image() {
    let mut f = fixture();
    assert!(!f.session.is_drawable());
    let path = stroke_at(&f.session, 10.0);
    assert!(f.session.commit(path).unwrap().is_none());
    assert!(!f.session.pointer_down(1.0, 1.0));
    assert!(f.session.history().performed().is_empty());
}

#[test]
fn invalid_path_is_dropped_whole() {
    let mut f = loaded(256, 256);
    let mask_before = f.session.mask_raster().unwrap();

    let bad = StrokePath::new(vec![PathPoint::new(f32::NAN, 3.0)], 20.0, WHITE);
    assert!(f.session.commit(bad).is_err());

    assert_eq!(f.session.mask_raster().unwrap(), mask_before);
    assert!(visible_paths(&f.session).is_empty());
    assert!(f.session.history().performed().is_empty());
    assert_eq!(f.sink.writes(), 0);
}

#[test]
fn loading_blocks_input() {
    let mut f = loaded(256, 256);
    f.session.begin_loading();
    assert!(!f.session.pointer_down(5.0, 5.0));
    let path = stroke_at(&f.session, 10.0);
    assert!(f.session.commit(path).unwrap().is_none());

    f.session.finish_loading();
    assert!(f.session.pointer_down(5.0, 5.0));
}

#[test]
fn pointer_gesture_commits_and_persists() {
    let mut f = loaded(256, 256);
    let now = Instant::now();
    assert!(f.session.pointer_down(30.0, 30.0));
    f.session.pointer_move(40.0, 35.0, now);
    f.session.pointer_move(60.0, 50.0, now + Duration::from_millis(16));

    let id = f.session.pointer_up().unwrap();
    assert!(id.is_some());
    assert!(f.session.pointer_up().unwrap().is_none());

    let input = f.sink.latest().unwrap();
    assert_eq!(input.source_processing, SourceProcessing::InPainting);
    assert_eq!(input.orientation, "custom");
    assert!(!input.source_mask.is_empty());

    let state = f.store.load();
    assert_eq!(state.mask_layer_state.unwrap().paths.len(), 1);
    assert_eq!(state.canvas_state.unwrap().visible_paths.len(), 1);
}

#[test]
fn preview_fades_after_idle_pointer() {
    let mut f = loaded(256, 256);
    let start = Instant::now();
    f.session.pointer_move(20.0, 20.0, start);

    let preview = |s: &CanvasSession| {
        s.surface()
            .unwrap()
            .layer(LayerKind::BrushPreview)
            .unwrap()
            .effective_opacity()
    };
    assert_eq!(preview(&f.session), 0.5);

    f.session.tick(start + Duration::from_millis(200));
    assert_eq!(preview(&f.session), 0.5);
    f.session.tick(start + Duration::from_millis(500));
    assert_eq!(preview(&f.session), 0.0);
}

#[test]
fn snapshot_restores_mask_pixels() {
    let mut f = loaded(256, 256);
    for x in [30.0, 90.0] {
        let path = stroke_at(&f.session, x);
        f.session.commit(path).unwrap();
    }
    f.session.toggle_mode();
    let (canvas, mask) = f.session.snapshot().unwrap();
    let mask_before = f.session.mask_raster().unwrap();

    let mut other = fixture();
    other.session.restore(canvas, Some(mask));
    assert_eq!(other.session.mode(), DrawMode::Erase);
    assert_eq!((other.session.width(), other.session.height()), (768, 768));
    assert_eq!(other.session.mask_raster().unwrap(), mask_before);
    assert!(other.session.history().performed().is_empty());

    // New ids never collide with restored ones
    let path = stroke_at(&other.session, 150.0);
    let id = other.session.commit(path).unwrap().unwrap();
    assert_eq!(id, StrokeId(3));
}

#[test]
fn unmount_releases_everything() {
    let mut f = loaded(256, 256);
    let path = stroke_at(&f.session, 10.0);
    f.session.commit(path).unwrap();

    f.session.unmount();
    assert!(!f.session.is_mounted());
    assert!(f.session.mask_layer().is_none());
    assert!(f.session.history().performed().is_empty());

    let path = StrokePath::new(vec![PathPoint::new(1.0, 1.0)], 20.0, WHITE);
    assert!(f.session.commit(path).unwrap().is_none());
    assert!(!f.session.undo());
    assert!(f.session.render().is_none());
    let payload = f.session.export_payload().unwrap();
    assert!(payload.mask.is_empty() && payload.image.is_empty());
}

#[test]
fn use_image_saves_inpainting_prompt() {
    let mut f = loaded(512, 256);
    let path = stroke_at(&f.session, 64.0);
    f.session.commit(path).unwrap();

    let prompts = PromptStore::new();
    let record = f.session.use_image(&prompts).unwrap();
    assert_eq!(record.sampler, FALLBACK_SAMPLER);
    assert_eq!(record.source_processing, SourceProcessing::InPainting);
    assert_eq!((record.width, record.height), (768, 384));
    assert!(record.copy_prompt);
    assert!(!record.source_mask.is_empty());
    assert_eq!(prompts.load_edit_prompt(), record);
}

#[test]
fn save_image_mask_writes_both_files() {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let dir = std::env::temp_dir().join(format!(
        "{}_download_test_{:x}{:x}",
        crate::app_meta::APP_STORAGE_PREFIX,
        now.as_secs(),
        now.subsec_nanos()
    ));

    let mut f = loaded(128, 128);
    f.session.save_image_mask(&dir).unwrap();
    assert!(dir.join("mask.webp").exists());
    assert!(dir.join("image.webp").exists());
}

#[tokio::test]
async fn editor_loads_image_off_lock() {
    let store = Arc::new(MemorySessionStore::new());
    let editor = Editor::new(
        EditorConfig::default(),
        store.clone(),
        Arc::new(MemoryInputSink::new()),
    );

    editor
        .load_image(ImageSource::File(png_bytes(1024, 512)), LoadOptions::default())
        .await
        .unwrap();

    let (width, height, loading) =
        editor.with_session(|s| (s.width(), s.height(), s.is_loading()));
    assert_eq!((width, height), (768, 384));
    assert!(!loading);
    assert!(store.load().last_image_string.is_some());
}

#[tokio::test]
async fn editor_load_failure_clears_loading() {
    let editor = Editor::new(
        EditorConfig::default(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryInputSink::new()),
    );
    let result = editor
        .load_image(ImageSource::File(vec![0, 1, 2]), LoadOptions::default())
        .await;
    assert!(result.is_err());
    assert!(!editor.with_session(|s| s.is_loading()));
    assert!(!editor.with_session(|s| s.is_drawable()));
}

#[tokio::test]
async fn mount_uses_handoff_image() {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    let store = MemorySessionStore::with_state(SessionState {
        i2i_source: Some(I2iSource {
            base64_string: BASE64.encode(png_bytes(400, 800)),
            height: 800,
            width: 400,
        }),
        ..Default::default()
    });
    let f = fixture_with_store(store);
    let editor = Editor::from_session(f.session);

    editor.mount().await.unwrap();
    let (width, height, drawable) =
        editor.with_session(|s| (s.width(), s.height(), s.is_drawable()));
    assert_eq!((width, height), (384, 768));
    assert!(drawable);
    let handoff = f.store.load().i2i_source.unwrap().base64_string;
    assert_eq!(f.store.load().last_image_string, Some(handoff));
}

#[tokio::test]
async fn mount_restores_saved_canvas() {
    let first = loaded(1200, 800);
    let editor = Editor::from_session(first.session);
    editor.with_session(|s| {
        let path = stroke_at(s, 200.0);
        s.commit(path).unwrap();
    });
    let mask_before = editor.with_session(|s| s.mask_raster()).unwrap();
    editor.unmount();

    // Same store, fresh editor
    let second = CanvasSession::new(
        EditorConfig::default(),
        first.store.clone(),
        Arc::new(MemoryInputSink::new()),
    );
    let editor = Editor::from_session(second);
    editor.mount().await.unwrap();

    editor.with_session(|s| {
        assert_eq!((s.width(), s.height()), (768, 512));
        assert!(s.is_drawable());
        assert!(s.surface().unwrap().has_layer(LayerKind::Image));
        assert_eq!(s.mask_raster().unwrap(), mask_before);
        assert!(!s.history().can_undo());
    });
}

#[tokio::test]
async fn mount_without_state_uses_default_canvas() {
    let f = fixture();
    let editor = Editor::from_session(f.session);
    editor.unmount();
    editor.mount().await.unwrap();

    let (width, height, drawable) =
        editor.with_session(|s| (s.width(), s.height(), s.is_drawable()));
    assert_eq!((width, height), (768, 512));
    assert!(!drawable);
}

fn remount(store: &Arc<MemorySessionStore>) -> Editor {
    Editor::from_session(CanvasSession::new(
        EditorConfig::default(),
        store.clone(),
        Arc::new(MemoryInputSink::new()),
    ))
}

#[tokio::test]
async fn remount_after_handoff_keeps_handoff_image() {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    // An earlier upload left its image in the store
    let first = loaded(1200, 800);
    let store = first.store.clone();
    store
        .update(&mut |state: &mut SessionState| {
            state.i2i_source = Some(I2iSource {
                base64_string: BASE64.encode(png_bytes_filled(400, 800, [20, 40, 220, 255])),
                height: 800,
                width: 400,
            });
        })
        .unwrap();

    let editor = remount(&store);
    editor.mount().await.unwrap();
    editor.with_session(|s| {
        let path = stroke_at(s, 150.0);
        s.commit(path).unwrap().unwrap();
    });
    let (hash_before, mask_before) =
        editor.with_session(|s| (s.image_hash().map(str::to_string), s.mask_raster()));
    editor.unmount();

    let editor = remount(&store);
    editor.mount().await.unwrap();
    editor.with_session(|s| {
        assert_eq!((s.width(), s.height()), (384, 768));
        assert_eq!(s.image_hash().map(str::to_string), hash_before);
        assert_eq!(s.mask_raster(), mask_before);
        assert_eq!(s.image_raster().unwrap().dimensions(), (384, 768));
    });
}

#[tokio::test]
async fn remount_after_decoded_load_restores_image() {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    let store = Arc::new(MemorySessionStore::new());
    let editor = remount(&store);
    editor
        .load_image(
            ImageSource::Encoded(BASE64.encode(png_bytes(512, 256))),
            LoadOptions {
                already_decoded: true,
                preserve_layers: false,
            },
        )
        .await
        .unwrap();
    editor.with_session(|s| {
        let path = stroke_at(s, 60.0);
        s.commit(path).unwrap().unwrap();
    });
    let hash_before = editor.with_session(|s| s.image_hash().map(str::to_string));
    assert!(hash_before.is_some());
    editor.unmount();

    let editor = remount(&store);
    editor.mount().await.unwrap();
    editor.with_session(|s| {
        assert!(s.is_drawable());
        assert_eq!((s.width(), s.height()), (768, 384));
        assert_eq!(s.image_hash().map(str::to_string), hash_before);
        let payload = s.export_payload().unwrap();
        assert!(!payload.image.is_empty());
        assert_eq!(decode_base64_image(&payload.image).unwrap().dimensions(), (768, 384));
    });
}

#[tokio::test]
async fn mount_discards_canvas_without_image() {
    let store = Arc::new(MemorySessionStore::with_state(SessionState {
        canvas_state: Some(crate::store::CanvasState {
            height: 300,
            width: 200,
            mode: DrawMode::Paint,
            visible_paths: Vec::new(),
        }),
        ..Default::default()
    }));

    let editor = remount(&store);
    editor.mount().await.unwrap();
    editor.with_session(|s| {
        assert_eq!((s.width(), s.height()), (768, 512));
        assert!(!s.is_drawable());
    });
    assert!(store.load().canvas_state.is_none());
}
