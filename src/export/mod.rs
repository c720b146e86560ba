//! Export - flatten the image and mask layers into transport payloads

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{InpaintError, Result};
use crate::ingest::strip_data_url;
use crate::store::{InputState, SourceProcessing};

pub const WEBP_MIME: &str = "image/webp";
/// Orientation reported for editor output; dimensions are free-form
pub const CUSTOM_ORIENTATION: &str = "custom";

const MAX_FILE_NAME_CHARS: usize = 255;

/// Encoded layers ready for submission. Strings are bare base64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportPayload {
    pub image: String,
    pub mask: String,
    pub height: u32,
    pub width: u32,
}

impl ExportPayload {
    /// Input-state record mirrored to the page after a stroke
    pub fn input_state(&self) -> InputState {
        InputState {
            image_type: WEBP_MIME.to_string(),
            source_image: self.image.clone(),
            source_mask: self.mask.clone(),
            source_processing: SourceProcessing::InPainting,
            orientation: CUSTOM_ORIENTATION.to_string(),
            height: self.height,
            width: self.width,
        }
    }
}

/// Lossy WebP, `quality` in 0 - 100
pub fn encode_webp_lossy(img: &RgbaImage, quality: f32) -> Result<Vec<u8>> {
    encode_webp(img, false, quality)
}

/// Lossless WebP; mask edges survive the round trip
pub fn encode_webp_lossless(img: &RgbaImage) -> Result<Vec<u8>> {
    encode_webp(img, true, 100.0)
}

fn encode_webp(img: &RgbaImage, lossless: bool, quality: f32) -> Result<Vec<u8>> {
    if img.width() == 0 || img.height() == 0 {
        return Err(InpaintError::Encode("cannot encode an empty raster".into()));
    }
    let encoder = webp::Encoder::from_rgba(img.as_raw(), img.width(), img.height());
    let memory = encoder
        .encode_simple(lossless, quality.clamp(0.0, 100.0))
        .map_err(|err| InpaintError::Encode(format!("{:?}", err)))?;
    Ok(memory.to_vec())
}

pub fn to_data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", WEBP_MIME, BASE64.encode(bytes))
}

/// Encode whatever layers exist; a missing layer exports as an empty string
pub fn build_payload(
    image: Option<&RgbaImage>,
    mask: Option<&RgbaImage>,
    height: u32,
    width: u32,
    image_quality: f32,
) -> Result<ExportPayload> {
    let image = match image {
        Some(img) => BASE64.encode(encode_webp_lossy(img, image_quality)?),
        None => String::new(),
    };
    let mask = match mask {
        Some(img) => BASE64.encode(encode_webp_lossless(img)?),
        None => String::new(),
    };
    Ok(ExportPayload {
        image,
        mask,
        height,
        width,
    })
}

/// Download name: at most 255 characters, then `.webp`
pub fn download_file_name(name: &str) -> String {
    let stem: String = name.chars().take(MAX_FILE_NAME_CHARS).collect();
    format!("{}.webp", stem)
}

/// Write a base64 (or data URL) payload to `dir` under a download name
pub fn write_download(dir: &Path, data: &str, name: &str) -> Result<PathBuf> {
    let bytes = BASE64.decode(strip_data_url(data).trim())?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(download_file_name(name));
    std::fs::write(&path, bytes)?;
    tracing::info!("Saved {}", path.display());
    Ok(path)
}
