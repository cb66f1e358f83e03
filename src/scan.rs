//! Source scanner.
//!
//! Lists the raster images the pipeline will process: regular files directly
//! inside the source directory whose extension (case-insensitive) is one of
//! [`SUPPORTED_EXTENSIONS`]. Subdirectories are ignored. Dot-prefixed names
//! are ordinary files: `.hero.png` is a PNG, `.png` has no extension.
//!
//! An absent or empty source directory is not an error. The build simply has
//! no images to process, so the scanner warns and returns an empty list.

use crate::imaging::{BackendError, Dimensions, ImageBackend, SUPPORTED_EXTENSIONS};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A source image on disk. Read-only input to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    /// File name with extension, e.g. `town.png`.
    pub file_name: String,
    /// File name without extension, e.g. `town`.
    pub base_name: String,
    /// Lowercase extension without the dot, e.g. `png`.
    pub extension: String,
    pub byte_size: u64,
}

impl SourceImage {
    /// Build from a path, reading its size. Returns `None` for paths without
    /// a UTF-8 file name or extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let base_name = path.file_stem()?.to_str()?.to_string();
        let extension = path.extension()?.to_str()?.to_lowercase();
        let byte_size = fs::metadata(path).ok()?.len();
        Some(Self {
            path: path.to_path_buf(),
            file_name,
            base_name,
            extension,
            byte_size,
        })
    }

    pub fn is_webp(&self) -> bool {
        self.extension == "webp"
    }

    /// Pixel dimensions, read on demand through the backend.
    pub fn dimensions(&self, backend: &impl ImageBackend) -> Result<Dimensions, BackendError> {
        backend.identify(&self.path)
    }
}

fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// List eligible images in `dir`, ordered by file name.
pub fn scan(dir: &Path) -> Result<Vec<SourceImage>, ScanError> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "source directory does not exist");
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => paths.push(entry.path()),
            Err(e) => warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry"),
        }
    }
    paths.retain(|p| p.is_file() && is_supported(p));
    paths.sort();

    let mut images = Vec::with_capacity(paths.len());
    for path in &paths {
        match SourceImage::from_path(path) {
            Some(image) => images.push(image),
            None => warn!(
                path = %path.display(),
                "skipping image with a non UTF-8 name or unreadable metadata"
            ),
        }
    }

    if images.is_empty() {
        warn!(dir = %dir.display(), "no image files found");
    }
    Ok(images)
}
