//! Image transcoding.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image` header read, format sniffed |
//! | **Decode + resize** | `image` decoders + Lanczos3 |
//! | **Encode → WebP** | `webp` (libwebp, lossy) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math and the quality ladder
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`transcode`], combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{ScaledDimensions, max_encode_attempts, quality_ladder, scaled_dimensions};
pub use operations::{TranscodeMode, TranscodedImage, search_quality, transcode};
pub use params::{Quality, ScaleParams};
pub use rust_backend::{RustBackend, SUPPORTED_EXTENSIONS};
