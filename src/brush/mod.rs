//! Brush module - tool mode, stroke geometry and the live brush preview

mod engine;
mod interpolation;
mod preview;

pub use engine::{BrushEngine, BrushSettings};
pub use interpolation::InterpolationMode;
pub use preview::{BrushController, BrushPreview, PreviewOutline};

use serde::{Deserialize, Serialize};

use crate::canvas::{Color, BLACK, RED, WHITE};
use crate::core::{InpaintError, Result};

/// A single pointer sample in canvas space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
}

impl PathPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Active tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    #[default]
    Paint,
    Erase,
}

impl DrawMode {
    pub fn toggled(self) -> Self {
        match self {
            DrawMode::Paint => DrawMode::Erase,
            DrawMode::Erase => DrawMode::Paint,
        }
    }

    /// Freehand brush color. Cosmetic for erase, the composite rule does the erasing.
    pub fn brush_color(self) -> Color {
        match self {
            DrawMode::Paint => WHITE,
            DrawMode::Erase => RED,
        }
    }

    /// Color a stroke leaves on the exported mask
    pub fn mask_color(self, stroke_color: Color) -> Color {
        match self {
            DrawMode::Paint => stroke_color,
            DrawMode::Erase => BLACK,
        }
    }
}

/// Freehand path geometry: a polyline stroked with a round cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokePath {
    pub points: Vec<PathPoint>,
    /// Stroke width (brush diameter) in pixels
    pub width: f32,
    /// RGBA stroke color
    pub color: Color,
}

impl StrokePath {
    pub fn new(points: Vec<PathPoint>, width: f32, color: Color) -> Self {
        Self {
            points,
            width,
            color,
        }
    }

    /// Clone the path for placement on a layer.
    ///
    /// Fails on geometry no layer can hold; the caller must drop the stroke.
    pub fn try_clone(&self) -> Result<StrokePath> {
        if self.points.is_empty() {
            return Err(InpaintError::InvalidStroke("path has no points".into()));
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(InpaintError::InvalidStroke(format!(
                "stroke width {} is not drawable",
                self.width
            )));
        }
        if let Some(bad) = self.points.iter().find(|p| !p.is_finite()) {
            return Err(InpaintError::InvalidStroke(format!(
                "non-finite point ({}, {})",
                bad.x, bad.y
            )));
        }
        Ok(self.clone())
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Axis-aligned bounds including the stroke half-width: (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.points.first()?;
        let half = self.width / 2.0;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some((min_x - half, min_y - half, max_x + half, max_y + half))
    }
}
