//! Production image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP, BMP, GIF) | `image` crate decoders, format guessed from content |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → WebP (lossy) | `webp::Encoder` (libwebp) |
//!
//! The `image` crate's own WebP encoder is lossless only, which rules out a
//! quality search; libwebp provides the lossy encoder.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Quality, ScaleParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Extensions the scanner accepts. All of them have decoders compiled in.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];

/// Backend built on the `image` and `webp` crates.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from its bytes.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Normalize to the two pixel layouts libwebp accepts.
fn to_webp_layout(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.into_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.into_rgb8())
    }
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to read dimensions of {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Dimensions { width, height })
    }

    fn load_scaled(&self, path: &Path, params: &ScaleParams) -> Result<DynamicImage, BackendError> {
        let img = load_image(path)?;
        let scaled = if img.width() == params.width && img.height() == params.height {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        Ok(to_webp_layout(scaled))
    }

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        let encoder = webp::Encoder::from_image(image).map_err(|e| {
            BackendError::ProcessingFailed(format!("WebP encoder setup failed: {e}"))
        })?;
        let encoded = encoder
            .encode_simple(false, quality.value() as f32)
            .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {e:?}")))?;
        Ok(encoded.to_vec())
    }
}
