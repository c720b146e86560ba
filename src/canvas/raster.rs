//! CPU rasterization of stroke geometry
//!
//! Strokes are rendered as round-capped polylines. Coverage is computed from
//! the distance to the nearest segment, with a one pixel anti-aliased edge,
//! and accumulated as a max over the whole path before compositing so that
//! overlapping segments never double-blend.

use image::RgbaImage;

use super::{Color, CompositeOp};
use crate::brush::{PathPoint, StrokePath};

/// Rendering backend used by layers
pub trait Rasterizer: Send + Sync + std::fmt::Debug {
    /// Stroke a freehand path onto `target`
    fn stroke_path(&self, target: &mut RgbaImage, path: &StrokePath, op: CompositeOp);

    /// Fill and/or outline a circle onto `target`
    fn draw_circle(
        &self,
        target: &mut RgbaImage,
        center: PathPoint,
        radius: f32,
        fill: Option<Color>,
        outline: Option<(Color, f32)>,
    );
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuRasterizer;

/// Pixel window clipped to a target, inclusive-exclusive
#[derive(Debug, Clone, Copy)]
struct Window {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Window {
    fn clip(bounds: (f32, f32, f32, f32), width: u32, height: u32) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil() + 1.0).clamp(0.0, width as f32) as u32;
        let y1 = (max_y.ceil() + 1.0).clamp(0.0, height as f32) as u32;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Self { x0, y0, x1, y1 })
    }

    fn width(&self) -> usize {
        (self.x1 - self.x0) as usize
    }

    fn height(&self) -> usize {
        (self.y1 - self.y0) as usize
    }
}

/// Coverage buffer over a clipped window
struct Coverage {
    window: Window,
    values: Vec<f32>,
}

impl Coverage {
    fn new(window: Window) -> Self {
        Self {
            values: vec![0.0; window.width() * window.height()],
            window,
        }
    }

    fn add_segment(&mut self, a: PathPoint, b: PathPoint, half_width: f32) {
        let pad = half_width + 1.0;
        let bounds = (
            a.x.min(b.x) - pad,
            a.y.min(b.y) - pad,
            a.x.max(b.x) + pad,
            a.y.max(b.y) + pad,
        );
        let w = self.window;
        let Some(seg) = Window::clip(bounds, w.x1, w.y1) else {
            return;
        };
        let x_start = seg.x0.max(w.x0);
        let y_start = seg.y0.max(w.y0);

        for y in y_start..seg.y1 {
            let row = (y - w.y0) as usize * w.width();
            let py = y as f32 + 0.5;
            for x in x_start..seg.x1 {
                let px = x as f32 + 0.5;
                let d = distance_to_segment(px, py, a, b);
                let c = (half_width + 0.5 - d).clamp(0.0, 1.0);
                let slot = &mut self.values[row + (x - w.x0) as usize];
                if c > *slot {
                    *slot = c;
                }
            }
        }
    }

    fn apply(&self, target: &mut RgbaImage, color: Color, op: CompositeOp) {
        let w = self.window;
        for y in w.y0..w.y1 {
            let row = (y - w.y0) as usize * w.width();
            for x in w.x0..w.x1 {
                let c = self.values[row + (x - w.x0) as usize];
                if c <= 0.0 {
                    continue;
                }
                let px = target.get_pixel_mut(x, y);
                match op {
                    CompositeOp::SourceOver => blend_source_over(&mut px.0, color, c),
                    CompositeOp::DestinationOut => blend_destination_out(&mut px.0, color, c),
                }
            }
        }
    }
}

fn distance_to_segment(px: f32, py: f32, a: PathPoint, b: PathPoint) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    let cx = a.x + dx * t;
    let cy = a.y + dy * t;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// `src` over `dst` with `coverage` scaling the source alpha
pub(crate) fn blend_source_over(dst: &mut [u8], src: Color, coverage: f32) {
    let sa = src[3] as f32 / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    for i in 0..3 {
        let sc = src[i] as f32;
        let dc = dst[i] as f32;
        let c = (sc * sa + dc * da * (1.0 - sa)) / out_a;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Punch out destination alpha. Source color is ignored, only its alpha counts.
pub(crate) fn blend_destination_out(dst: &mut [u8], src: Color, coverage: f32) {
    let sa = src[3] as f32 / 255.0 * coverage;
    let remaining = dst[3] as f32 * (1.0 - sa);
    let alpha = remaining.round().clamp(0.0, 255.0) as u8;
    if alpha == 0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
    } else {
        dst[3] = alpha;
    }
}

impl Rasterizer for CpuRasterizer {
    fn stroke_path(&self, target: &mut RgbaImage, path: &StrokePath, op: CompositeOp) {
        let Some(bounds) = path.bounds() else {
            return;
        };
        let Some(window) = Window::clip(bounds, target.width(), target.height()) else {
            return;
        };

        let half_width = path.width / 2.0;
        let mut coverage = Coverage::new(window);
        match path.points.as_slice() {
            [] => return,
            [only] => coverage.add_segment(*only, *only, half_width),
            points => {
                for pair in points.windows(2) {
                    coverage.add_segment(pair[0], pair[1], half_width);
                }
            }
        }
        coverage.apply(target, path.color, op);
    }

    fn draw_circle(
        &self,
        target: &mut RgbaImage,
        center: PathPoint,
        radius: f32,
        fill: Option<Color>,
        outline: Option<(Color, f32)>,
    ) {
        let outer = radius + outline.map(|(_, w)| w / 2.0).unwrap_or(0.0) + 1.0;
        let bounds = (
            center.x - outer,
            center.y - outer,
            center.x + outer,
            center.y + outer,
        );
        let Some(window) = Window::clip(bounds, target.width(), target.height()) else {
            return;
        };

        for y in window.y0..window.y1 {
            for x in window.x0..window.x1 {
                let d = ((x as f32 + 0.5 - center.x).powi(2)
                    + (y as f32 + 0.5 - center.y).powi(2))
                .sqrt();
                let px = target.get_pixel_mut(x, y);
                if let Some(color) = fill {
                    let c = (radius + 0.5 - d).clamp(0.0, 1.0);
                    if c > 0.0 {
                        blend_source_over(&mut px.0, color, c);
                    }
                }
                if let Some((color, width)) = outline {
                    let c = (width / 2.0 + 0.5 - (d - radius).abs()).clamp(0.0, 1.0);
                    if c > 0.0 {
                        blend_source_over(&mut px.0, color, c);
                    }
                }
            }
        }
    }
}
