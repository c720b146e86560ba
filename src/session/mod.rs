//! Canvas session - one editing session over an image
//!
//! Owns the layer surface, the off-screen export mask, the brush controller
//! and the stroke history. Every public operation is a no-op while the
//! surface is missing (after unmount) or while an image is loading.

mod handle;

#[cfg(test)]
mod tests;

pub use handle::Editor;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;

use crate::brush::{BrushController, DrawMode, PathPoint, StrokePath};
use crate::canvas::{Layer, LayerContent, LayerKind, LayerSurface};
use crate::config::EditorConfig;
use crate::core::{InpaintError, Result};
use crate::export::{self, ExportPayload, CUSTOM_ORIENTATION, WEBP_MIME};
use crate::history::{Stroke, StrokeClones, StrokeHistory, StrokeId};
use crate::ingest::{self, DecodedImage, ImageSource, LoadOptions};
use crate::store::{
    CanvasState, InputSink, MaskLayerState, PromptRecord, PromptStore, SessionStore,
    SourceProcessing, FALLBACK_SAMPLER,
};

pub struct CanvasSession {
    config: EditorConfig,
    surface: Option<LayerSurface>,
    mask: Option<Layer>,
    /// Content hash of the installed image
    image_hash: Option<String>,
    brush: BrushController,
    history: StrokeHistory,
    next_stroke_id: u64,
    /// Raw pointer samples of the gesture in progress
    gesture: Option<Vec<PathPoint>>,
    pending_loads: usize,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn InputSink>,
}

impl std::fmt::Debug for CanvasSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSession")
            .field("height", &self.height())
            .field("width", &self.width())
            .field("mode", &self.mode())
            .field("drawable", &self.is_drawable())
            .field("performed", &self.history.performed().len())
            .field("undone", &self.history.undone().len())
            .field("loading", &self.is_loading())
            .finish()
    }
}

impl CanvasSession {
    /// Mounted session with a blank default-size surface
    pub fn new(
        config: EditorConfig,
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn InputSink>,
    ) -> Self {
        let brush = BrushController::new(&config);
        let mut session = Self {
            config,
            surface: None,
            mask: None,
            image_hash: None,
            brush,
            history: StrokeHistory::new(),
            next_stroke_id: 1,
            gesture: None,
            pending_loads: 0,
            store,
            sink,
        };
        let (height, width) = (session.config.default_height, session.config.default_width);
        session.init_canvas(height, width);
        session
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_loads > 0
    }

    pub fn is_drawable(&self) -> bool {
        self.surface.as_ref().is_some_and(LayerSurface::is_drawable)
    }

    pub fn height(&self) -> u32 {
        self.surface.as_ref().map_or(0, LayerSurface::height)
    }

    pub fn width(&self) -> u32 {
        self.surface.as_ref().map_or(0, LayerSurface::width)
    }

    pub fn mode(&self) -> DrawMode {
        self.brush.mode()
    }

    pub fn brush(&self) -> &BrushController {
        &self.brush
    }

    pub fn history(&self) -> &StrokeHistory {
        &self.history
    }

    pub fn surface(&self) -> Option<&LayerSurface> {
        self.surface.as_ref()
    }

    pub fn image_hash(&self) -> Option<&str> {
        self.image_hash.as_deref()
    }

    /// Off-screen export mask
    pub fn mask_layer(&self) -> Option<&Layer> {
        self.mask.as_ref()
    }

    /// Start over with a blank, non-drawable surface of the given size.
    ///
    /// Creates the surface again if the session was unmounted.
    pub fn init_canvas(&mut self, height: u32, width: u32) {
        let surface = self
            .surface
            .get_or_insert_with(|| LayerSurface::new(height, width));
        surface.initialize(height, width);
        surface.add_layer(Layer::brush_preview(width, height));
        self.mask = None;
        self.image_hash = None;
        self.gesture = None;
        self.brush.hide_preview();
        tracing::info!("Canvas initialized at {}x{}", width, height);
    }

    /// Detach the image and mask layers and stop accepting strokes
    pub fn reset(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.reset();
        self.mask = None;
        self.image_hash = None;
        self.gesture = None;
    }

    /// Drop both history stacks (a new session starts)
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ===== Ingestion =====

    pub(crate) fn begin_loading(&mut self) {
        self.pending_loads += 1;
        self.gesture = None;
    }

    pub(crate) fn finish_loading(&mut self) {
        self.pending_loads = self.pending_loads.saturating_sub(1);
    }

    /// Decode and install an image on the calling thread
    pub fn load_image(&mut self, source: ImageSource, options: LoadOptions) -> Result<()> {
        if !self.is_mounted() {
            tracing::debug!("Ignoring image load on unmounted session");
            return Ok(());
        }
        self.begin_loading();
        let decoded = ingest::decode_source(source, options, &self.config);
        self.finish_loading();
        self.install_image(decoded?, options.preserve_layers);
        Ok(())
    }

    /// Put a decoded image on the surface and enable drawing.
    ///
    /// Without `preserve_layers` the mask layers start empty, the history is
    /// cleared and the stored strokes are dropped. With it, existing mask
    /// layers are resized and kept. Either way the image source is stored.
    pub fn install_image(&mut self, decoded: DecodedImage, preserve_layers: bool) {
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("Dropping decoded image, session is unmounted");
            return;
        };

        let (visible, mask) = if preserve_layers {
            (surface.remove_layer(LayerKind::VisibleMask), self.mask.take())
        } else {
            (None, None)
        };

        surface.reset();
        surface.resize(decoded.height, decoded.width);
        if !surface.has_layer(LayerKind::BrushPreview) {
            surface.add_layer(Layer::brush_preview(decoded.width, decoded.height));
        }
        surface.add_layer(Layer::image(decoded.bitmap));

        let opacity = self.config.visible_mask_opacity;
        let mut visible =
            visible.unwrap_or_else(|| Layer::visible_mask(decoded.width, decoded.height, opacity));
        visible.resize(decoded.width, decoded.height);
        let mut mask = mask.unwrap_or_else(|| Layer::mask(decoded.width, decoded.height));
        mask.resize(decoded.width, decoded.height);

        surface.add_layer(visible);
        surface.set_drawable(true);
        self.mask = Some(mask);
        self.gesture = None;

        // The stored image always matches the one on the surface
        let stored = if preserve_layers {
            self.store.store_image_string(&decoded.source_string)
        } else {
            self.history.clear();
            self.store.replace_image(&decoded.source_string)
        };
        if let Err(err) = stored {
            tracing::warn!("Failed to store installed image: {}", err);
        }
        tracing::info!(
            "Image {} installed at {}x{} (preserve layers: {})",
            &decoded.content_hash[..decoded.content_hash.len().min(12)],
            decoded.width,
            decoded.height,
            preserve_layers
        );
        self.image_hash = Some(decoded.content_hash);
    }

    // ===== Pointer input =====

    fn accepts_strokes(&self) -> bool {
        !self.is_loading()
            && self.is_drawable()
            && self.mask.is_some()
            && self
                .surface
                .as_ref()
                .is_some_and(|s| s.has_layer(LayerKind::VisibleMask))
    }

    /// Begin a freehand gesture. Returns false when drawing is disabled.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> bool {
        if !self.accepts_strokes() {
            return false;
        }
        self.gesture = Some(vec![PathPoint::new(x, y)]);
        true
    }

    /// Move the brush preview and extend the gesture in progress
    pub fn pointer_move(&mut self, x: f32, y: f32, now: Instant) {
        if self.surface.is_none() || self.is_loading() {
            return;
        }
        self.brush.on_pointer_move(x, y, now);
        if let Some(samples) = self.gesture.as_mut() {
            samples.push(PathPoint::new(x, y));
        }
        self.sync_preview();
    }

    /// Finish the gesture and commit it as a stroke
    pub fn pointer_up(&mut self) -> Result<Option<StrokeId>> {
        let Some(samples) = self.gesture.take() else {
            return Ok(None);
        };
        match self.brush.build_path(&samples) {
            Some(path) => self.commit(path),
            None => Ok(None),
        }
    }

    /// Advance the preview fade timer
    pub fn tick(&mut self, now: Instant) {
        if self.brush.tick(now) {
            self.sync_preview();
        }
    }

    pub fn toggle_mode(&mut self) -> DrawMode {
        let mode = self.brush.toggle_mode();
        tracing::debug!("Draw mode: {:?}", mode);
        mode
    }

    fn sync_preview(&mut self) {
        let preview = *self.brush.preview();
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if let Some(layer) = surface.layer_mut(LayerKind::BrushPreview) {
            layer.set_preview(Some(preview));
            surface.render();
        }
    }

    // ===== History =====

    /// Commit a finished path as a stroke in the current mode.
    ///
    /// Returns `Ok(None)` when drawing is disabled. A path that cannot be
    /// cloned is dropped whole and neither layer changes.
    pub fn commit(&mut self, path: StrokePath) -> Result<Option<StrokeId>> {
        if !self.accepts_strokes() {
            tracing::debug!("Ignoring stroke, canvas is not accepting input");
            return Ok(None);
        }
        let id = StrokeId(self.next_stroke_id);
        let mut stroke = Stroke::new(id, path, self.brush.mode());
        if let Err(err) = self.place(&mut stroke) {
            self.gesture = None;
            return Err(err);
        }
        self.next_stroke_id += 1;
        self.history.push_new(stroke);
        tracing::debug!(
            "Committed stroke {} ({} performed)",
            id.0,
            self.history.performed().len()
        );
        self.persist();
        Ok(Some(id))
    }

    /// Derive both clones and put them on the mask layers
    fn place(&mut self, stroke: &mut Stroke) -> Result<()> {
        let clones = StrokeClones::derive(stroke.id, &stroke.path, stroke.mode)?;
        let (Some(surface), Some(mask)) = (self.surface.as_mut(), self.mask.as_mut()) else {
            return Err(InpaintError::NotInitialized);
        };
        let rasterizer = surface.rasterizer();
        let Some(visible) = surface.layer_mut(LayerKind::VisibleMask) else {
            return Err(InpaintError::NotInitialized);
        };

        mask.add_path(clones.mask.clone(), rasterizer.as_ref());
        visible.add_path(clones.visible.clone(), rasterizer.as_ref());
        self.gesture = None;
        surface.render();

        stroke.clones = Some(clones);
        Ok(())
    }

    /// Remove the latest stroke from both layers. False when nothing to undo.
    pub fn undo(&mut self) -> bool {
        if !self.accepts_strokes() {
            return false;
        }
        let Some(mut stroke) = self.history.pop_performed() else {
            return false;
        };
        if stroke.clones.take().is_some() {
            if let Some(mask) = self.mask.as_mut() {
                mask.remove_path(stroke.id);
            }
            if let Some(surface) = self.surface.as_mut() {
                if let Some(visible) = surface.layer_mut(LayerKind::VisibleMask) {
                    visible.remove_path(stroke.id);
                }
                surface.render();
            }
        }
        tracing::debug!("Undid stroke {}", stroke.id.0);
        self.history.push_undone(stroke);
        self.persist();
        true
    }

    /// Replay the latest undone stroke with its recorded mode
    pub fn redo(&mut self) -> Result<bool> {
        if !self.accepts_strokes() {
            return Ok(false);
        }
        let Some(mut stroke) = self.history.pop_undone() else {
            return Ok(false);
        };
        if let Err(err) = self.place(&mut stroke) {
            self.history.push_undone(stroke);
            return Err(err);
        }
        tracing::debug!("Redid stroke {} as {:?}", stroke.id.0, stroke.mode);
        self.history.push_redone(stroke);
        self.persist();
        Ok(true)
    }

    // ===== Snapshot / restore =====

    /// Serializable record of the current canvas
    pub fn snapshot(&self) -> Option<(CanvasState, MaskLayerState)> {
        let surface = self.surface.as_ref()?;
        let visible_paths = surface
            .layer(LayerKind::VisibleMask)
            .map(|l| l.paths().to_vec())
            .unwrap_or_default();
        let paths = self
            .mask
            .as_ref()
            .map(|l| l.paths().to_vec())
            .unwrap_or_default();
        Some((
            CanvasState {
                height: surface.height(),
                width: surface.width(),
                mode: self.brush.mode(),
                visible_paths,
            },
            MaskLayerState { paths },
        ))
    }

    /// Rebuild the mask layers from a saved snapshot.
    ///
    /// Restored strokes are not in the history, so they cannot be undone.
    pub fn restore(&mut self, canvas: CanvasState, mask: Option<MaskLayerState>) {
        self.init_canvas(canvas.height, canvas.width);
        self.history.clear();
        self.brush.set_mode(canvas.mode);

        let mask_paths = mask.map(|m| m.paths).unwrap_or_default();
        let highest = canvas
            .visible_paths
            .iter()
            .chain(mask_paths.iter())
            .map(|p| p.stroke_id.0)
            .max()
            .unwrap_or(0);
        self.next_stroke_id = self.next_stroke_id.max(highest + 1);

        let mut visible =
            Layer::visible_mask(canvas.width, canvas.height, self.config.visible_mask_opacity);
        visible.set_paths(canvas.visible_paths);
        let mut mask = Layer::mask(canvas.width, canvas.height);
        mask.set_paths(mask_paths);

        if let Some(surface) = self.surface.as_mut() {
            surface.add_layer(visible);
            surface.set_drawable(true);
        }
        self.mask = Some(mask);
        tracing::info!(
            "Restored canvas {}x{} with {} mask paths",
            canvas.width,
            canvas.height,
            self.mask.as_ref().map_or(0, |m| m.paths().len())
        );
    }

    // ===== Export =====

    fn image_raster(&self) -> Option<&RgbaImage> {
        match self.surface.as_ref()?.layer(LayerKind::Image)?.content() {
            LayerContent::Bitmap(bitmap) => Some(bitmap),
            _ => None,
        }
    }

    /// Current pixels of the export mask
    pub fn mask_raster(&mut self) -> Option<RgbaImage> {
        let rasterizer = self.surface.as_ref()?.rasterizer();
        self.mask
            .as_mut()
            .map(|m| m.render(rasterizer.as_ref()).clone())
    }

    /// Encode the image and export mask layers
    pub fn export_payload(&mut self) -> Result<ExportPayload> {
        let (height, width) = (self.height(), self.width());
        let quality = self.config.image_webp_quality;
        let mask = self.mask_raster();
        export::build_payload(self.image_raster(), mask.as_ref(), height, width, quality)
    }

    /// Store the canvas snapshot and push the payload to the input sink.
    ///
    /// Failures are logged; a stroke is never rolled back for them.
    fn persist(&mut self) {
        if let Some((canvas, mask)) = self.snapshot() {
            if let Err(err) = self.store.store_canvas(canvas, mask) {
                tracing::warn!("Failed to store canvas state: {}", err);
            }
        }
        self.auto_persist();
    }

    /// Forward the current payload to the input sink
    pub fn auto_persist(&mut self) {
        if !self.is_mounted() {
            return;
        }
        let payload = match self.export_payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!("Failed to export canvas: {}", err);
                return;
            }
        };
        if let Err(err) = self.sink.set_input(payload.input_state()) {
            tracing::warn!("Failed to update input state: {}", err);
        }
    }

    /// Hand the image and mask to the create page as an inpainting prompt
    pub fn use_image(&mut self, prompts: &PromptStore) -> Result<PromptRecord> {
        if !self.is_mounted() {
            return Err(InpaintError::NotInitialized);
        }
        let payload = self.export_payload()?;
        let record = PromptRecord {
            image_type: WEBP_MIME.to_string(),
            sampler: FALLBACK_SAMPLER.to_string(),
            orientation: CUSTOM_ORIENTATION.to_string(),
            height: payload.height,
            width: payload.width,
            source_image: payload.image,
            source_mask: payload.mask,
            source_processing: SourceProcessing::InPainting,
            ..Default::default()
        };
        prompts.save_prompt(record);
        Ok(prompts.load_edit_prompt())
    }

    /// Write `mask.webp` and `image.webp` into `dir`
    pub fn save_image_mask(&mut self, dir: &Path) -> Result<ExportPayload> {
        let payload = self.export_payload()?;
        if !payload.mask.is_empty() {
            export::write_download(dir, &payload.mask, "mask")?;
        }
        if !payload.image.is_empty() {
            export::write_download(dir, &payload.image, "image")?;
        }
        Ok(payload)
    }

    /// Composited frame, if mounted
    pub fn render(&mut self) -> Option<&RgbaImage> {
        self.surface.as_mut().map(|s| s.render())
    }

    /// Release the surface and every layer
    pub fn unmount(&mut self) {
        self.surface = None;
        self.mask = None;
        self.image_hash = None;
        self.gesture = None;
        self.history.clear();
        self.brush.hide_preview();
        tracing::info!("Canvas session unmounted");
    }
}
