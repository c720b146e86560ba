//! Brush engine - turns raw pointer samples into a freehand path

use super::interpolation::{interpolate_catmull_rom, interpolate_linear, InterpolationMode};
use super::{PathPoint, StrokePath};
use crate::canvas::Color;

/// Brush settings
#[derive(Debug, Clone)]
pub struct BrushSettings {
    /// Brush radius in pixels
    pub radius: f32,
    /// Distance between resampled points (as fraction of diameter)
    pub spacing: f32,
    /// Interpolation mode
    pub interpolation: InterpolationMode,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 10.0,
            spacing: 0.25,
            interpolation: InterpolationMode::CatmullRom,
        }
    }
}

impl BrushSettings {
    pub fn diameter(&self) -> f32 {
        self.radius * 2.0
    }
}

/// Converts pointer samples into stroke geometry
#[derive(Debug, Clone, Default)]
pub struct BrushEngine {
    settings: BrushSettings,
}

impl BrushEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: BrushSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BrushSettings {
        &self.settings
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.settings.radius = radius.max(0.5);
    }

    /// Build a freehand path from raw samples. A single sample yields a dot.
    pub fn process(&self, points: &[PathPoint], color: Color) -> Option<StrokePath> {
        if points.is_empty() {
            return None;
        }

        let points = self.interpolate_points(points);
        Some(StrokePath::new(points, self.settings.diameter(), color))
    }

    fn interpolate_points(&self, points: &[PathPoint]) -> Vec<PathPoint> {
        let spacing = self.settings.diameter() * self.settings.spacing;
        match self.settings.interpolation {
            InterpolationMode::None => points.to_vec(),
            InterpolationMode::Linear => interpolate_linear(points, spacing),
            InterpolationMode::CatmullRom if points.len() < 4 => {
                interpolate_linear(points, spacing)
            }
            InterpolationMode::CatmullRom => interpolate_catmull_rom(points, spacing),
        }
    }
}
