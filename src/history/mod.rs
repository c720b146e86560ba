//! Stroke history - performed / undone stacks
//!
//! A committed stroke lives in exactly one of the two stacks. Moving between
//! them is a pop followed by a push, so a stroke is never duplicated.

use serde::{Deserialize, Serialize};

use crate::brush::{DrawMode, StrokePath};
use crate::canvas::{CompositeOp, PathObject};
use crate::core::Result;

/// Session-unique stroke identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrokeId(pub u64);

/// The pair of clones a stroke places on the mask layers
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeClones {
    pub mask: PathObject,
    pub visible: PathObject,
}

impl StrokeClones {
    /// Clone `path` for both mask layers, styled by `mode`.
    ///
    /// Erase strokes punch through the overlay and paint black on the
    /// export mask. Either clone failing drops the whole pair.
    pub fn derive(id: StrokeId, path: &StrokePath, mode: DrawMode) -> Result<Self> {
        let mask_path = path.try_clone()?;
        let visible_path = path.try_clone()?;

        let visible_composite = match mode {
            DrawMode::Erase => CompositeOp::DestinationOut,
            DrawMode::Paint => CompositeOp::SourceOver,
        };
        let mask_color = mode.mask_color(mask_path.color);

        Ok(Self {
            mask: PathObject {
                stroke_id: id,
                path: mask_path.with_color(mask_color),
                composite: CompositeOp::SourceOver,
            },
            visible: PathObject {
                stroke_id: id,
                path: visible_path,
                composite: visible_composite,
            },
        })
    }
}

/// One freehand path the user drew
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub id: StrokeId,
    pub path: StrokePath,
    /// Mode at the time the stroke was drawn; redo replays with this
    pub mode: DrawMode,
    /// Clones currently placed on the layers; `None` while undone
    pub clones: Option<StrokeClones>,
}

impl Stroke {
    pub fn new(id: StrokeId, path: StrokePath, mode: DrawMode) -> Self {
        Self {
            id,
            path,
            mode,
            clones: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct StrokeHistory {
    performed: Vec<Stroke>,
    undone: Vec<Stroke>,
}

impl StrokeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly drawn stroke. Discards the redo branch.
    pub fn push_new(&mut self, stroke: Stroke) {
        if !self.undone.is_empty() {
            tracing::debug!("Discarding {} undone strokes", self.undone.len());
            self.undone.clear();
        }
        self.performed.push(stroke);
    }

    /// Record a replayed stroke. The redo branch is kept.
    pub fn push_redone(&mut self, stroke: Stroke) {
        self.performed.push(stroke);
    }

    pub fn pop_performed(&mut self) -> Option<Stroke> {
        self.performed.pop()
    }

    pub fn push_undone(&mut self, stroke: Stroke) {
        self.undone.push(stroke);
    }

    pub fn pop_undone(&mut self) -> Option<Stroke> {
        self.undone.pop()
    }

    pub fn performed(&self) -> &[Stroke] {
        &self.performed
    }

    pub fn undone(&self) -> &[Stroke] {
        &self.undone
    }

    pub fn can_undo(&self) -> bool {
        !self.performed.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn clear(&mut self) {
        self.performed.clear();
        self.undone.clear();
    }
}
