//! Individual layers of the drawing surface

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::{Color, CompositeOp, LayerKind, Rasterizer, BLACK, TRANSPARENT};
use crate::brush::{BrushPreview, StrokePath};
use crate::history::StrokeId;

/// A stroke clone placed on a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathObject {
    pub stroke_id: StrokeId,
    pub path: StrokePath,
    pub composite: CompositeOp,
}

#[derive(Debug, Clone)]
pub enum LayerContent {
    /// Decoded image, already scaled to the layer size
    Bitmap(RgbaImage),
    /// Path objects drawn in order over the layer background
    Paths(Vec<PathObject>),
    /// Pointer-following brush circle
    Preview(Option<BrushPreview>),
}

#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    opacity: f32,
    composite: CompositeOp,
    background: Color,
    content: LayerContent,
    raster: RgbaImage,
    dirty: bool,
}

impl Layer {
    fn with_content(
        kind: LayerKind,
        width: u32,
        height: u32,
        background: Color,
        content: LayerContent,
    ) -> Self {
        Self {
            kind,
            opacity: 1.0,
            composite: CompositeOp::SourceOver,
            background,
            content,
            raster: RgbaImage::from_pixel(width, height, Rgba(background)),
            dirty: true,
        }
    }

    /// Image layer wrapping an already-scaled bitmap
    pub fn image(bitmap: RgbaImage) -> Self {
        let mut layer = Self::with_content(
            LayerKind::Image,
            0,
            0,
            TRANSPARENT,
            LayerContent::Bitmap(bitmap),
        );
        layer.dirty = false;
        layer
    }

    /// Off-screen export mask: opaque black, strokes paint white
    pub fn mask(width: u32, height: u32) -> Self {
        Self::with_content(
            LayerKind::Mask,
            width,
            height,
            BLACK,
            LayerContent::Paths(Vec::new()),
        )
    }

    /// Rendered mask overlay: transparent, semi-opaque when composited
    pub fn visible_mask(width: u32, height: u32, opacity: f32) -> Self {
        let mut layer = Self::with_content(
            LayerKind::VisibleMask,
            width,
            height,
            TRANSPARENT,
            LayerContent::Paths(Vec::new()),
        );
        layer.set_opacity(opacity);
        layer
    }

    pub fn brush_preview(width: u32, height: u32) -> Self {
        Self::with_content(
            LayerKind::BrushPreview,
            width,
            height,
            TRANSPARENT,
            LayerContent::Preview(None),
        )
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Rule used when this layer is composited onto the surface
    pub fn composite_rule(&self) -> CompositeOp {
        self.composite
    }

    pub fn content(&self) -> &LayerContent {
        &self.content
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match &self.content {
            LayerContent::Bitmap(bitmap) => bitmap.dimensions(),
            _ => self.raster.dimensions(),
        }
    }

    /// Opacity actually applied during compositing
    pub fn effective_opacity(&self) -> f32 {
        match &self.content {
            LayerContent::Preview(Some(preview)) => self.opacity * preview.opacity,
            LayerContent::Preview(None) => 0.0,
            _ => self.opacity,
        }
    }

    pub fn paths(&self) -> &[PathObject] {
        match &self.content {
            LayerContent::Paths(paths) => paths,
            _ => &[],
        }
    }

    /// Append a path object. Ignored on layers that do not hold paths.
    pub fn add_path(&mut self, object: PathObject, rasterizer: &dyn Rasterizer) {
        let LayerContent::Paths(paths) = &mut self.content else {
            tracing::warn!("Layer {} does not hold paths", self.kind.name());
            return;
        };
        // Drawing on top of a clean raster gives the same pixels as a rebuild
        if !self.dirty {
            rasterizer.stroke_path(&mut self.raster, &object.path, object.composite);
        }
        paths.push(object);
    }

    /// Remove the path object belonging to `stroke_id`
    pub fn remove_path(&mut self, stroke_id: StrokeId) -> Option<PathObject> {
        let LayerContent::Paths(paths) = &mut self.content else {
            return None;
        };
        let index = paths.iter().rposition(|p| p.stroke_id == stroke_id)?;
        self.dirty = true;
        Some(paths.remove(index))
    }

    /// Replace all path objects (session restore)
    pub fn set_paths(&mut self, objects: Vec<PathObject>) {
        if let LayerContent::Paths(paths) = &mut self.content {
            *paths = objects;
            self.dirty = true;
        }
    }

    pub fn set_preview(&mut self, preview: Option<BrushPreview>) {
        if let LayerContent::Preview(current) = &mut self.content {
            if *current != preview {
                *current = preview;
                self.dirty = true;
            }
        }
    }

    /// Reallocate the raster at a new size. Bitmap layers keep their pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        if matches!(self.content, LayerContent::Bitmap(_)) {
            return;
        }
        if self.raster.dimensions() != (width, height) {
            self.raster = RgbaImage::from_pixel(width, height, Rgba(self.background));
            self.dirty = true;
        }
    }

    /// Rasterize the layer content if anything changed since the last render
    pub fn render(&mut self, rasterizer: &dyn Rasterizer) -> &RgbaImage {
        if let LayerContent::Bitmap(bitmap) = &self.content {
            return bitmap;
        }

        if self.dirty {
            let background = Rgba(self.background);
            for px in self.raster.pixels_mut() {
                *px = background;
            }
            match &self.content {
                LayerContent::Paths(paths) => {
                    for object in paths {
                        rasterizer.stroke_path(&mut self.raster, &object.path, object.composite);
                    }
                }
                LayerContent::Preview(Some(preview)) => {
                    rasterizer.draw_circle(
                        &mut self.raster,
                        preview.center,
                        preview.radius,
                        preview.fill,
                        preview.outline.map(|o| (o.color, o.width)),
                    );
                }
                LayerContent::Preview(None) | LayerContent::Bitmap(_) => {}
            }
            self.dirty = false;
        }

        &self.raster
    }
}
