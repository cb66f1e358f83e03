//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the three operations the transcoder
//! needs: identify, decode + resize, and in-memory WebP encode. Splitting
//! decode from encode lets the quality search re-encode one decoded image
//! at several qualities without touching the disk again.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{Quality, ScaleParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Decoded, already-scaled pixel data ready for encoding.
    type Image;

    /// Get image dimensions without a full decode where the format allows it.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the source and resize it to exactly `params` dimensions.
    fn load_scaled(&self, path: &Path, params: &ScaleParams) -> Result<Self::Image, BackendError>;

    /// Encode to WebP in memory at the given quality.
    fn encode(&self, image: &Self::Image, quality: Quality) -> Result<Vec<u8>, BackendError>;
}
