//! Interpolation algorithms for smooth freehand paths

use super::PathPoint;

/// Interpolation mode for freehand paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// Raw pointer samples
    None,
    /// Linear interpolation
    Linear,
    /// Catmull-Rom spline (smooth curves)
    #[default]
    CatmullRom,
}

/// Linear resampling so consecutive points are at most `spacing` apart
pub fn interpolate_linear(points: &[PathPoint], spacing: f32) -> Vec<PathPoint> {
    if points.len() < 2 || spacing <= 0.0 {
        return points.to_vec();
    }

    let mut result = Vec::with_capacity(points.len() * 4);

    for pair in points.windows(2) {
        let (p0, p1) = (pair[0], pair[1]);
        let dx = p1.x - p0.x;
        let dy = p1.y - p0.y;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist < spacing {
            result.push(p0);
            continue;
        }

        let steps = (dist / spacing).ceil() as usize;
        for step in 0..steps {
            let t = step as f32 / steps as f32;
            result.push(PathPoint::new(p0.x + dx * t, p0.y + dy * t));
        }
    }

    if let Some(last) = points.last() {
        result.push(*last);
    }

    result
}

/// Uniform Catmull-Rom resampling.
///
/// The curve passes through every sample; endpoints are duplicated so the
/// first and last segments have a full set of control points.
pub fn interpolate_catmull_rom(points: &[PathPoint], spacing: f32) -> Vec<PathPoint> {
    if points.len() < 4 || spacing <= 0.0 {
        return points.to_vec();
    }

    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let mut controls = Vec::with_capacity(points.len() + 2);
    controls.push(first);
    controls.extend_from_slice(points);
    controls.push(last);

    let mut out = Vec::with_capacity(points.len() * 8);
    for quad in controls.windows(4) {
        let [a, b, c, d] = [quad[0], quad[1], quad[2], quad[3]];
        let chord = ((c.x - b.x).powi(2) + (c.y - b.y).powi(2)).sqrt();
        let steps = ((chord / spacing).ceil() as usize).max(1);
        out.extend((0..steps).map(|i| spline_at(a, b, c, d, i as f32 / steps as f32)));
    }
    out.push(last);
    out
}

/// Point at `t` on the segment b..c, with a and d as tangent neighbours
fn spline_at(a: PathPoint, b: PathPoint, c: PathPoint, d: PathPoint, t: f32) -> PathPoint {
    let eval = |p0: f32, p1: f32, p2: f32, p3: f32| {
        let m1 = 0.5 * (p2 - p0);
        let m2 = 0.5 * (p3 - p1);
        let t2 = t * t;
        let t3 = t2 * t;
        (2.0 * t3 - 3.0 * t2 + 1.0) * p1
            + (t3 - 2.0 * t2 + t) * m1
            + (-2.0 * t3 + 3.0 * t2) * p2
            + (t3 - t2) * m2
    };
    PathPoint::new(eval(a.x, b.x, c.x, d.x), eval(a.y, b.y, c.y, d.y))
}
