//! Brush controller - tool mode plus the pointer-following radius preview
//!
//! The preview fades out after a period of pointer inactivity. Time is passed
//! in explicitly (`on_pointer_move(.., now)` / `tick(now)`) so the debounce is
//! deterministic under test.

use std::time::{Duration, Instant};

use super::{BrushEngine, DrawMode, PathPoint, StrokePath};
use crate::canvas::{Color, RED, WHITE};
use crate::config::EditorConfig;

const ERASE_OUTLINE_WIDTH: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewOutline {
    pub color: Color,
    pub width: f32,
}

/// Circle drawn under the pointer on the brush-preview layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushPreview {
    pub center: PathPoint,
    pub radius: f32,
    pub opacity: f32,
    pub fill: Option<Color>,
    pub outline: Option<PreviewOutline>,
}

impl BrushPreview {
    fn hidden(radius: f32) -> Self {
        Self {
            center: PathPoint::new(0.0, 0.0),
            radius,
            opacity: 0.0,
            fill: None,
            outline: Some(PreviewOutline {
                color: RED,
                width: ERASE_OUTLINE_WIDTH,
            }),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct BrushController {
    mode: DrawMode,
    color: Color,
    engine: BrushEngine,
    preview: BrushPreview,
    active_opacity: f32,
    fade_after: Duration,
    last_motion: Option<Instant>,
}

impl BrushController {
    pub fn new(config: &EditorConfig) -> Self {
        let mut engine = BrushEngine::new();
        engine.set_radius(config.brush_radius);
        Self {
            mode: DrawMode::Paint,
            color: DrawMode::Paint.brush_color(),
            preview: BrushPreview::hidden(engine.settings().radius),
            engine,
            active_opacity: config.preview_opacity,
            fade_after: Duration::from_millis(config.preview_fade_ms),
            last_motion: None,
        }
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Current freehand brush color
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn radius(&self) -> f32 {
        self.engine.settings().radius
    }

    pub fn preview(&self) -> &BrushPreview {
        &self.preview
    }

    /// Flip paint <-> erase and recolor the brush
    pub fn toggle_mode(&mut self) -> DrawMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn set_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
        self.color = mode.brush_color();
    }

    /// Move the preview under the pointer and style it for the active mode
    pub fn on_pointer_move(&mut self, x: f32, y: f32, now: Instant) {
        self.preview.center = PathPoint::new(x, y);
        self.preview.opacity = self.active_opacity;
        self.preview.radius = self.radius();

        match self.mode {
            DrawMode::Erase => {
                self.preview.fill = Some(RED);
                self.preview.outline = Some(PreviewOutline {
                    color: RED,
                    width: ERASE_OUTLINE_WIDTH,
                });
            }
            DrawMode::Paint => {
                self.preview.fill = Some(WHITE);
                self.preview.outline = None;
            }
        }
        self.color = self.mode.brush_color();
        self.last_motion = Some(now);
    }

    /// Fade the preview once the pointer has been idle long enough.
    ///
    /// Returns true when this call hid the preview.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_motion else {
            return false;
        };
        if now.saturating_duration_since(last) < self.fade_after {
            return false;
        }
        self.last_motion = None;
        if !self.preview.is_visible() {
            return false;
        }
        self.preview.opacity = 0.0;
        true
    }

    /// Hide the preview immediately
    pub fn hide_preview(&mut self) {
        self.preview.opacity = 0.0;
        self.last_motion = None;
    }

    /// Build the freehand path for a finished pointer gesture
    pub fn build_path(&self, samples: &[PathPoint]) -> Option<StrokePath> {
        self.engine.process(samples, self.color)
    }
}
