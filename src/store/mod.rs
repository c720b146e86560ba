//! Collaborator interfaces - session persistence, input state and prompts
//!
//! The editor only needs a handful of read/write hooks from the outside
//! world. Each hook is a trait with an in-memory implementation; the session
//! store also has a JSON file implementation.

mod file;
mod prompt;

pub use file::FileSessionStore;
pub use prompt::{valid_sampler, PromptRecord, PromptStore, DEFAULT_SAMPLER, FALLBACK_SAMPLER};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::brush::DrawMode;
use crate::canvas::PathObject;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for String {
    fn from(err: StoreError) -> Self {
        err.to_string()
    }
}

/// What the generation request does with the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceProcessing {
    #[default]
    #[serde(rename = "prompt")]
    Prompt,
    #[serde(rename = "img2img")]
    Img2Img,
    #[serde(rename = "inpainting")]
    InPainting,
}

/// Visible canvas state: size, tool and the overlay strokes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    pub height: u32,
    pub width: u32,
    #[serde(default)]
    pub mode: DrawMode,
    #[serde(default)]
    pub visible_paths: Vec<PathObject>,
}

/// Export mask strokes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskLayerState {
    pub paths: Vec<PathObject>,
}

/// Image handed over from another page (e.g. "use for img2img")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct I2iSource {
    pub base64_string: String,
    pub height: u32,
    pub width: u32,
}

/// Everything persisted for one editing session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub canvas_state: Option<CanvasState>,
    pub mask_layer_state: Option<MaskLayerState>,
    pub last_image_string: Option<String>,
    pub i2i_source: Option<I2iSource>,
}

/// Key-value persistence scoped to the current editing session
pub trait SessionStore: Send + Sync {
    fn load(&self) -> SessionState;

    fn save(&self, state: &SessionState) -> Result<(), StoreError>;

    fn update(&self, apply: &mut dyn FnMut(&mut SessionState)) -> Result<(), StoreError> {
        let mut state = self.load();
        apply(&mut state);
        self.save(&state)
    }

    fn store_canvas(&self, canvas: CanvasState, mask: MaskLayerState) -> Result<(), StoreError> {
        let mut pending = Some((canvas, mask));
        self.update(&mut |state: &mut SessionState| {
            if let Some((canvas, mask)) = pending.take() {
                state.canvas_state = Some(canvas);
                state.mask_layer_state = Some(mask);
            }
        })
    }

    fn store_image_string(&self, image: &str) -> Result<(), StoreError> {
        self.update(&mut |state: &mut SessionState| {
            state.last_image_string = Some(image.to_string());
        })
    }

    /// Record a newly installed image and drop strokes drawn over the old one
    fn replace_image(&self, image: &str) -> Result<(), StoreError> {
        self.update(&mut |state: &mut SessionState| {
            state.canvas_state = None;
            state.mask_layer_state = None;
            state.last_image_string = Some(image.to_string());
        })
    }

    /// Forget the in-progress edit but keep any pending hand-off image
    fn clear_canvas(&self) -> Result<(), StoreError> {
        self.update(&mut |state: &mut SessionState| {
            state.canvas_state = None;
            state.mask_layer_state = None;
        })
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: RwLock<SessionState>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SessionState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> SessionState {
        self.state.read().clone()
    }

    fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        *self.state.write() = state.clone();
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut SessionState)) -> Result<(), StoreError> {
        let mut guard = self.state.write();
        apply(&mut *guard);
        Ok(())
    }
}

/// Generation input mirrored from the editor after every stroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputState {
    pub image_type: String,
    #[serde(rename = "source_image")]
    pub source_image: String,
    #[serde(rename = "source_mask")]
    pub source_mask: String,
    #[serde(rename = "source_processing")]
    pub source_processing: SourceProcessing,
    pub orientation: String,
    pub height: u32,
    pub width: u32,
}

/// Receives the latest editor input (the page-level `setInput`)
pub trait InputSink: Send + Sync {
    fn set_input(&self, input: InputState) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryInputSink {
    latest: RwLock<Option<InputState>>,
    writes: RwLock<usize>,
}

impl MemoryInputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<InputState> {
        self.latest.read().clone()
    }

    /// Number of inputs received so far
    pub fn writes(&self) -> usize {
        *self.writes.read()
    }
}

impl InputSink for MemoryInputSink {
    fn set_input(&self, input: InputState) -> Result<(), StoreError> {
        *self.latest.write() = Some(input);
        *self.writes.write() += 1;
        Ok(())
    }
}
