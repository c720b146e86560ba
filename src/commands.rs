//! Editor commands - JSON interface between a UI layer and the editor

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

use crate::brush::DrawMode;
use crate::export::ExportPayload;
use crate::history::StrokeId;
use crate::ingest::{strip_data_url, ImageSource, LoadOptions};
use crate::session::{CanvasSession, Editor};
use crate::store::{PromptRecord, PromptStore};

/// Editor state returned to the UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorInfo {
    pub width: u32,
    pub height: u32,
    pub mode: DrawMode,
    pub drawable: bool,
    pub loading: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub image_hash: Option<String>,
}

impl EditorInfo {
    fn from_session(session: &CanvasSession) -> Self {
        Self {
            width: session.width(),
            height: session.height(),
            mode: session.mode(),
            drawable: session.is_drawable(),
            loading: session.is_loading(),
            can_undo: session.history().can_undo(),
            can_redo: session.history().can_redo(),
            image_hash: session.image_hash().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EditorCommand {
    Mount,
    Unmount,
    #[serde(rename_all = "camelCase")]
    LoadImage {
        /// Base64 or data URL
        data: String,
        #[serde(default)]
        already_decoded: bool,
        #[serde(default)]
        preserve_layers: bool,
    },
    ToggleMode,
    PointerDown {
        x: f32,
        y: f32,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp,
    Tick,
    Undo,
    Redo,
    Export,
    UseImage,
    Download {
        dir: PathBuf,
    },
    GetInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CommandResponse {
    Info(EditorInfo),
    Mode(DrawMode),
    Stroke(Option<StrokeId>),
    Applied(bool),
    Payload(ExportPayload),
    Prompt(PromptRecord),
}

/// Parse and run a JSON command
pub async fn dispatch_json(
    editor: &Editor,
    prompts: &PromptStore,
    json: &str,
) -> Result<CommandResponse, String> {
    let command: EditorCommand =
        serde_json::from_str(json).map_err(|e| format!("Invalid command: {}", e))?;
    dispatch(editor, prompts, command).await
}

/// Run one command against the editor
pub async fn dispatch(
    editor: &Editor,
    prompts: &PromptStore,
    command: EditorCommand,
) -> Result<CommandResponse, String> {
    match command {
        EditorCommand::Mount => {
            editor.mount().await?;
        }
        EditorCommand::Unmount => editor.unmount(),
        EditorCommand::LoadImage {
            data,
            already_decoded,
            preserve_layers,
        } => {
            let source = if already_decoded {
                ImageSource::Encoded(data)
            } else {
                let bytes = BASE64
                    .decode(strip_data_url(&data).trim())
                    .map_err(|e| format!("Failed to decode image data: {}", e))?;
                ImageSource::File(bytes)
            };
            editor
                .load_image(
                    source,
                    LoadOptions {
                        already_decoded,
                        preserve_layers,
                    },
                )
                .await?;
        }
        EditorCommand::ToggleMode => {
            return Ok(CommandResponse::Mode(
                editor.with_session(|s| s.toggle_mode()),
            ));
        }
        EditorCommand::PointerDown { x, y } => {
            return Ok(CommandResponse::Applied(
                editor.with_session(|s| s.pointer_down(x, y)),
            ));
        }
        EditorCommand::PointerMove { x, y } => {
            editor.with_session(|s| s.pointer_move(x, y, Instant::now()));
        }
        EditorCommand::PointerUp => {
            let id = editor.with_session(|s| s.pointer_up())?;
            return Ok(CommandResponse::Stroke(id));
        }
        EditorCommand::Tick => {
            editor.with_session(|s| s.tick(Instant::now()));
        }
        EditorCommand::Undo => {
            return Ok(CommandResponse::Applied(editor.with_session(|s| s.undo())));
        }
        EditorCommand::Redo => {
            let applied = editor.with_session(|s| s.redo())?;
            return Ok(CommandResponse::Applied(applied));
        }
        EditorCommand::Export => {
            let payload = editor.with_session(|s| s.export_payload())?;
            return Ok(CommandResponse::Payload(payload));
        }
        EditorCommand::UseImage => {
            let record = editor.with_session(|s| s.use_image(prompts))?;
            return Ok(CommandResponse::Prompt(record));
        }
        EditorCommand::Download { dir } => {
            let payload = editor.with_session(|s| s.save_image_mask(&dir))?;
            return Ok(CommandResponse::Payload(payload));
        }
        EditorCommand::GetInfo => {}
    }

    Ok(CommandResponse::Info(
        editor.with_session(|s| EditorInfo::from_session(s)),
    ))
}
