//! Layer surface - stacked raster layers composited in z-order
//!
//! The visible surface holds the image layer, the rendered mask overlay and
//! the brush preview. The export mask is a layer of the same type that is
//! owned by the session and never attached here.

mod layer;
mod raster;
mod surface;

pub use layer::{Layer, LayerContent, PathObject};
pub use raster::{CpuRasterizer, Rasterizer};
pub use surface::LayerSurface;

use serde::{Deserialize, Serialize};

/// RGBA color, non-premultiplied
pub type Color = [u8; 4];

pub const WHITE: Color = [255, 255, 255, 255];
pub const BLACK: Color = [0, 0, 0, 255];
pub const RED: Color = [255, 0, 0, 255];
pub const TRANSPARENT: Color = [0, 0, 0, 0];

/// How a source is combined with what is already on a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeOp {
    /// Normal painting
    #[default]
    SourceOver,
    /// Removes destination alpha where the source covers it
    DestinationOut,
}

/// Named layer roles. Declaration order is z-order (bottom first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerKind {
    Image,
    /// Hidden full-opacity mask used for export
    Mask,
    /// Semi-transparent overlay the user sees
    VisibleMask,
    BrushPreview,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Image => "image",
            LayerKind::Mask => "mask",
            LayerKind::VisibleMask => "visibleMask",
            LayerKind::BrushPreview => "brushPreview",
        }
    }

    /// Whether the layer may be attached to the visible surface
    pub fn is_rendered(&self) -> bool {
        !matches!(self, LayerKind::Mask)
    }
}
