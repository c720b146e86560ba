//! ArtBot Inpaint - layered mask editor for inpainting requests
//!
//! Paint a mask over an uploaded image, undo/redo strokes and export the
//! image and mask as WebP payloads for the generation backend.

pub mod app_meta;
pub mod brush;
pub mod canvas;
pub mod commands;
pub mod config;
pub mod core;
pub mod export;
pub mod history;
pub mod ingest;
pub mod session;
pub mod store;

pub use config::EditorConfig;
pub use session::{CanvasSession, Editor};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Safe to call more than once.
pub fn init() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", app_meta::APP_LOG_TARGET).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("{} inpaint editor initializing...", app_meta::APP_NAME);
    }
}
