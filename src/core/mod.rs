//! Shared error types for the editor core.

pub mod errors;

pub use errors::{InpaintError, Result};
