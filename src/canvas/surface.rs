//! Composited drawing surface

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::raster::{blend_destination_out, blend_source_over};
use super::{CompositeOp, CpuRasterizer, Layer, LayerKind, Rasterizer, WHITE};

/// Ordered layer stack rendered over a white canvas
#[derive(Debug)]
pub struct LayerSurface {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    output: RgbaImage,
    drawable: bool,
    rasterizer: Arc<dyn Rasterizer>,
}

impl LayerSurface {
    /// Blank, non-drawable surface using the CPU rasterizer
    pub fn new(height: u32, width: u32) -> Self {
        Self::with_rasterizer(height, width, Arc::new(CpuRasterizer))
    }

    pub fn with_rasterizer(height: u32, width: u32, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            output: RgbaImage::from_pixel(width, height, Rgba(WHITE)),
            drawable: false,
            rasterizer,
        }
    }

    /// Drop every layer and start over at the given size
    pub fn initialize(&mut self, height: u32, width: u32) {
        self.layers.clear();
        self.drawable = false;
        self.resize(height, width);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_drawable(&self) -> bool {
        self.drawable
    }

    pub fn set_drawable(&mut self, drawable: bool) {
        self.drawable = drawable;
    }

    pub fn rasterizer(&self) -> Arc<dyn Rasterizer> {
        Arc::clone(&self.rasterizer)
    }

    /// Change the canvas size. Path layers are reallocated, bitmaps are kept.
    pub fn resize(&mut self, height: u32, width: u32) {
        self.height = height;
        self.width = width;
        for layer in &mut self.layers {
            layer.resize(width, height);
        }
        self.render();
    }

    /// Attach a layer at its z position, replacing any layer of the same kind
    pub fn add_layer(&mut self, layer: Layer) {
        let kind = layer.kind();
        if !kind.is_rendered() {
            tracing::warn!("Refusing to attach off-screen {} layer", kind.name());
            return;
        }
        if layer.dimensions() != (self.width, self.height) {
            tracing::debug!(
                "Attaching {} layer {:?} to {}x{} surface",
                kind.name(),
                layer.dimensions(),
                self.width,
                self.height
            );
        }
        self.layers.retain(|l| l.kind() != kind);
        let index = self
            .layers
            .iter()
            .position(|l| l.kind() > kind)
            .unwrap_or(self.layers.len());
        self.layers.insert(index, layer);
        self.render();
    }

    /// Detach and return the layer of `kind`
    pub fn remove_layer(&mut self, kind: LayerKind) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.kind() == kind)?;
        let layer = self.layers.remove(index);
        self.render();
        Some(layer)
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind() == kind)
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.kind() == kind)
    }

    pub fn has_layer(&self, kind: LayerKind) -> bool {
        self.layer(kind).is_some()
    }

    /// Attached layer kinds, bottom first
    pub fn layer_kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(Layer::kind).collect()
    }

    /// Detach the image and visible-mask layers and stop accepting strokes
    pub fn reset(&mut self) {
        self.layers
            .retain(|l| !matches!(l.kind(), LayerKind::Image | LayerKind::VisibleMask));
        self.drawable = false;
        self.render();
    }

    /// Last composited frame
    pub fn output(&self) -> &RgbaImage {
        &self.output
    }

    /// Recomposite all attached layers
    pub fn render(&mut self) -> &RgbaImage {
        if self.output.dimensions() != (self.width, self.height) {
            self.output = RgbaImage::new(self.width, self.height);
        }
        let background = Rgba(WHITE);
        for px in self.output.pixels_mut() {
            *px = background;
        }

        let rasterizer = Arc::clone(&self.rasterizer);
        for layer in &mut self.layers {
            let opacity = layer.effective_opacity();
            if opacity <= 0.0 {
                continue;
            }
            let rule = layer.composite_rule();
            let name = layer.kind().name();
            let src = layer.render(rasterizer.as_ref());
            if src.dimensions() != self.output.dimensions() {
                tracing::debug!(
                    "Skipping {} layer with mismatched size {:?}",
                    name,
                    src.dimensions()
                );
                continue;
            }
            composite_onto(&mut self.output, src, opacity, rule);
        }

        &self.output
    }
}

fn composite_onto(dst: &mut RgbaImage, src: &RgbaImage, opacity: f32, rule: CompositeOp) {
    let row_bytes = dst.width() as usize * 4;
    if row_bytes == 0 {
        return;
    }
    let dst_buf: &mut [u8] = dst.as_mut();
    let src_buf: &[u8] = src.as_raw();

    dst_buf
        .par_chunks_mut(row_bytes)
        .zip(src_buf.par_chunks(row_bytes))
        .for_each(|(dst_row, src_row)| {
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                let color = [s[0], s[1], s[2], s[3]];
                match rule {
                    CompositeOp::SourceOver => blend_source_over(d, color, opacity),
                    CompositeOp::DestinationOut => blend_destination_out(d, color, opacity),
                }
            }
        });
}
