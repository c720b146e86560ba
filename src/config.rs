//! Editor configuration
//!
//! Defaults match the web editor. A `config.json` in the application data
//! directory may override any subset of fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::app_meta::APP_CONFIG_DIR_NAME;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Long edge of the editing canvas after ingestion
    pub max_long_edge: u32,
    /// Bound applied to raw uploads before they are stored
    pub upload_bound: u32,
    /// Re-encode quality for stored uploads (0.0 - 1.0)
    pub upload_quality: f32,
    /// Brush radius in pixels
    pub brush_radius: f32,
    /// Pointer inactivity before the brush preview fades out
    pub preview_fade_ms: u64,
    /// Brush preview opacity while the pointer is moving
    pub preview_opacity: f32,
    /// Opacity of the rendered mask overlay
    pub visible_mask_opacity: f32,
    /// Canvas height before any image is loaded
    pub default_height: u32,
    /// Canvas width before any image is loaded
    pub default_width: u32,
    /// WebP quality for the exported image layer (0 - 100)
    pub image_webp_quality: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_long_edge: 768,
            upload_bound: 1024,
            upload_quality: 0.9,
            brush_radius: 10.0,
            preview_fade_ms: 500,
            preview_opacity: 0.5,
            visible_mask_opacity: 0.8,
            default_height: 512,
            default_width: 768,
            image_webp_quality: 90.0,
        }
    }
}

impl EditorConfig {
    /// Load from an explicit path. Missing or malformed files yield defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<EditorConfig>(&json) {
                Ok(config) => {
                    tracing::info!("Loaded editor config from {}", path.display());
                    config.sanitized()
                }
                Err(err) => {
                    tracing::warn!("Invalid editor config {}: {}", path.display(), err);
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("Failed to read editor config {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    /// Load from the platform data directory
    pub fn load_default() -> Self {
        Self::load(&config_path())
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Clamp values that would make the editor unusable
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.max_long_edge == 0 {
            self.max_long_edge = defaults.max_long_edge;
        }
        if self.upload_bound == 0 {
            self.upload_bound = defaults.upload_bound;
        }
        if self.default_height == 0 || self.default_width == 0 {
            self.default_height = defaults.default_height;
            self.default_width = defaults.default_width;
        }
        self.upload_quality = self.upload_quality.clamp(0.0, 1.0);
        self.brush_radius = self.brush_radius.max(0.5);
        self.preview_opacity = self.preview_opacity.clamp(0.0, 1.0);
        self.visible_mask_opacity = self.visible_mask_opacity.clamp(0.0, 1.0);
        self.image_webp_quality = self.image_webp_quality.clamp(0.0, 100.0);
        self
    }
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_CONFIG_DIR_NAME)
}

fn config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE_NAME)
}
