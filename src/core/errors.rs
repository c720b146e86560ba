use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum InpaintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid stroke: {0}")]
    InvalidStroke(String),

    #[error("WebP encode error: {0}")]
    Encode(String),

    #[error("Canvas is not initialized")]
    NotInitialized,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<InpaintError> for String {
    fn from(err: InpaintError) -> Self {
        err.to_string()
    }
}

impl From<tokio::task::JoinError> for InpaintError {
    fn from(err: tokio::task::JoinError) -> Self {
        InpaintError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InpaintError>;
