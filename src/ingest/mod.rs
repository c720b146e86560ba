//! Image ingestion - decode, bound and scale an uploaded image
//!
//! Raw uploads are bounded to `upload_bound` and re-encoded. The encoded
//! string travels with the decoded image so the session can store it when the
//! image is installed, and a reload restores the same pixels. Every image is
//! then scaled so its long edge equals `max_long_edge`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::imageops::FilterType;
use image::RgbaImage;
use sha2::{Digest, Sha256};

use crate::config::EditorConfig;
use crate::core::{InpaintError, Result};
use crate::export::{encode_webp_lossy, to_data_url};

/// Where an image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw file bytes from an upload
    File(Vec<u8>),
    /// Base64 payload, with or without a `data:` prefix
    Encoded(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip the upload bound/re-encode step (source was stored earlier)
    pub already_decoded: bool,
    /// Keep the current mask layers instead of starting fresh
    pub preserve_layers: bool,
}

/// Decoded bitmap at editing size
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bitmap: RgbaImage,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of the scaled RGBA pixels, hex encoded
    pub content_hash: String,
    /// Encoded source to persist as `lastImageString`
    pub source_string: String,
}

pub fn content_hash(img: &RgbaImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(img.as_raw());
    hex::encode(hasher.finalize())
}

/// Scale so the long edge equals `max`, keeping the aspect ratio.
///
/// Landscape and square images pin the width, portrait images the height.
pub fn fit_to_long_edge(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    if width >= height {
        let scaled = (max as f64 * height as f64 / width as f64).round() as u32;
        (max, scaled.max(1))
    } else {
        let scaled = (max as f64 * width as f64 / height as f64).round() as u32;
        (scaled.max(1), max)
    }
}

/// Shrink to fit inside `bound` x `bound`. Never enlarges.
pub fn fit_within(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width <= bound && height <= bound {
        return (width, height);
    }
    fit_to_long_edge(width, height, bound)
}

/// Strip a `data:<mime>;base64,` prefix if present
pub fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        data.split_once(',').map(|(_, payload)| payload).unwrap_or(data)
    } else {
        data
    }
}

/// Decode base64 (or a data URL) into an RGBA bitmap
pub fn decode_base64_image(data: &str) -> Result<RgbaImage> {
    let bytes = BASE64.decode(strip_data_url(data).trim())?;
    decode_bytes(&bytes)
}

fn decode_bytes(bytes: &[u8]) -> Result<RgbaImage> {
    if bytes.is_empty() {
        return Err(InpaintError::InvalidImage("empty image data".into()));
    }
    let img = image::load_from_memory(bytes)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(InpaintError::InvalidImage(format!(
            "image has no pixels ({}x{})",
            img.width(),
            img.height()
        )));
    }
    Ok(img)
}

fn resize_exact(img: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        return img;
    }
    image::imageops::resize(&img, width, height, FilterType::Lanczos3)
}

/// Bound a raw upload and re-encode it for storage.
///
/// Returns the bounded bitmap and its data URL.
pub fn prepare_upload(bytes: &[u8], config: &EditorConfig) -> Result<(RgbaImage, String)> {
    let img = decode_bytes(bytes)?;
    let (width, height) = fit_within(img.width(), img.height(), config.upload_bound);
    let bounded = resize_exact(img, width, height);
    let encoded = encode_webp_lossy(&bounded, config.upload_quality * 100.0)?;
    Ok((bounded, to_data_url(&encoded)))
}

/// Decode `source` and scale it to editing size.
///
/// Blocking and CPU heavy; the editor handle runs it off the session lock.
pub fn decode_source(
    source: ImageSource,
    options: LoadOptions,
    config: &EditorConfig,
) -> Result<DecodedImage> {
    let (img, source_string) = if options.already_decoded {
        match source {
            ImageSource::Encoded(data) => (decode_base64_image(&data)?, data),
            ImageSource::File(bytes) => (decode_bytes(&bytes)?, BASE64.encode(&bytes)),
        }
    } else {
        let bytes = match source {
            ImageSource::File(bytes) => bytes,
            ImageSource::Encoded(data) => BASE64.decode(strip_data_url(&data).trim())?,
        };
        prepare_upload(&bytes, config)?
    };

    let (width, height) = fit_to_long_edge(img.width(), img.height(), config.max_long_edge);
    tracing::debug!(
        "Scaling {}x{} image to {}x{}",
        img.width(),
        img.height(),
        width,
        height
    );
    let bitmap = resize_exact(img, width, height);
    let content_hash = content_hash(&bitmap);

    Ok(DecodedImage {
        bitmap,
        width,
        height,
        content_hash,
        source_string,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([20, 120, 200, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_long_edge_scaling() {
        assert_eq!(fit_to_long_edge(1024, 512, 768), (768, 384));
        assert_eq!(fit_to_long_edge(512, 1024, 768), (384, 768));
        assert_eq!(fit_to_long_edge(768, 768, 768), (768, 768));
        assert_eq!(fit_to_long_edge(1200, 800, 768), (768, 512));
    }

    #[test]
    fn test_small_images_are_enlarged() {
        assert_eq!(fit_to_long_edge(384, 256, 768), (768, 512));
    }

    #[test]
    fn test_upload_bound_only_shrinks() {
        assert_eq!(fit_within(800, 600, 1024), (800, 600));
        assert_eq!(fit_within(2048, 1024, 1024), (1024, 512));
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/webp;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn test_upload_is_scaled_and_bounded() {
        let decoded = decode_source(
            ImageSource::File(png_bytes(1200, 800)),
            LoadOptions::default(),
            &EditorConfig::default(),
        )
        .unwrap();

        assert_eq!((decoded.width, decoded.height), (768, 512));
        assert_eq!(decoded.bitmap.dimensions(), (768, 512));

        assert!(decoded.source_string.starts_with("data:image/webp;base64,"));
        let bounded = decode_base64_image(&decoded.source_string).unwrap();
        assert_eq!(bounded.dimensions(), (1024, 683));
    }

    #[test]
    fn test_decoded_source_is_kept_verbatim() {
        let encoded = BASE64.encode(png_bytes(512, 1024));
        let decoded = decode_source(
            ImageSource::Encoded(encoded.clone()),
            LoadOptions {
                already_decoded: true,
                preserve_layers: false,
            },
            &EditorConfig::default(),
        )
        .unwrap();

        assert_eq!((decoded.width, decoded.height), (384, 768));
        assert_eq!(decoded.content_hash.len(), 64);
        assert_eq!(decoded.source_string, encoded);
    }

    #[test]
    fn test_decoded_file_bytes_are_encoded() {
        let decoded = decode_source(
            ImageSource::File(png_bytes(64, 32)),
            LoadOptions {
                already_decoded: true,
                preserve_layers: false,
            },
            &EditorConfig::default(),
        )
        .unwrap();

        let again = decode_base64_image(&decoded.source_string).unwrap();
        assert_eq!(again.dimensions(), (64, 32));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let config = EditorConfig::default();
        let result = decode_source(
            ImageSource::File(vec![1, 2, 3, 4]),
            LoadOptions::default(),
            &config,
        );
        assert!(result.is_err());

        assert!(decode_base64_image("not base64!").is_err());
        assert!(decode_source(ImageSource::File(Vec::new()), LoadOptions::default(), &config).is_err());
    }
}
