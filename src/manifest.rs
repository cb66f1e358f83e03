//! Manifest synchronization.
//!
//! The site's page data lives in a JSON manifest produced by an upstream build
//! step. Its image records (by default `gallery[*].src`) point at the original
//! file names, e.g. `/pic/town.png`. After transcoding, every such reference
//! is rewritten to the content-hashed public path, e.g.
//! `/pic/town-1a2b3c4d.webp`.
//!
//! ## Fidelity
//!
//! The manifest is owned by someone else. Only the configured reference field
//! of records inside the configured collection is ever touched; every other
//! value, including references that cannot be resolved, is written back as
//! it was read (modulo whitespace). Key order is kept (`serde_json`'s
//! `preserve_order`) and numbers keep their original text
//! (`arbitrary_precision`), so `12345678901234567890123` or `1.50` survive
//! the round trip unchanged.
//!
//! ## Unresolved references
//!
//! A reference whose base name has no artifact in this run (source removed,
//! renamed, or failed to transcode) stays as-is and is reported as a warning.
//! A dangling-but-present path is preferable to dropping content.
//!
//! ## Re-runs
//!
//! A reference that already carries a hash suffix (`town-1a2b3c4d.webp`) is
//! looked up by its unhashed base name as well, so running the pipeline again
//! on an already-rewritten manifest converges to the current hashes.
//!
//! ## Persistence
//!
//! The manifest is written minified, replacing the previous file atomically
//! (temp file + rename), plus an optional `<manifest>.gz` at gzip level 9 for
//! servers that can serve pre-compressed files.

use crate::config::ManifestConfig;
use crate::naming::{HashedArtifact, base_name_of, split_hash_suffix};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest not found: {0}")]
    Missing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Original base name → public path of its hashed artifact.
///
/// Built once per run, consumed by [`rewrite_references`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMapping {
    entries: HashMap<String, String>,
}

impl NameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the artifact's base name to its public path.
    ///
    /// Sources sharing a base name (`town.jpg`, `town.png`) collide: the
    /// later one wins and the replaced path is returned.
    pub fn insert(&mut self, artifact: &HashedArtifact) -> Option<String> {
        let previous = self.entries.insert(
            artifact.original_base_name.clone(),
            artifact.public_path.clone(),
        );
        if let Some(old) = &previous
            && *old != artifact.public_path
        {
            warn!(
                base_name = %artifact.original_base_name,
                replaced = %old,
                kept = %artifact.public_path,
                "several sources share a base name, manifest references use the last one"
            );
        }
        previous
    }

    pub fn get(&self, base_name: &str) -> Option<&str> {
        self.entries.get(base_name).map(String::as_str)
    }

    /// Resolve a reference to its new public path.
    ///
    /// Tries the exact base name first, then the base name with an existing
    /// hash suffix removed.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        let base = base_name_of(reference)?;
        self.get(base).or_else(|| {
            split_hash_suffix(base).and_then(|(unhashed, _)| self.get(unhashed))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the rewrite pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// References replaced with a new hashed path.
    pub rewritten: usize,
    /// References that already pointed at the current hashed path.
    pub unchanged: usize,
    /// References left as-is because no artifact matched.
    pub unresolved: Vec<String>,
}

/// A parsed manifest and the size of the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    pub value: Value,
    pub raw_size: u64,
}

/// Sizes reported after persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistStats {
    pub original_size: u64,
    pub minified_size: u64,
    pub gzip_size: Option<u64>,
}

/// Read and parse the manifest. A missing file is [`ManifestError::Missing`].
pub fn load_manifest(path: &Path) -> Result<ManifestDocument, ManifestError> {
    if !path.is_file() {
        return Err(ManifestError::Missing(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    Ok(ManifestDocument {
        value,
        raw_size: raw.len() as u64,
    })
}

/// Rewrite image references in `doc[collection][*][reference_field]`.
///
/// Only string references containing `public_prefix` are considered. Records
/// that are not objects, lack the field, or hold a non-string value are left
/// alone, as is a missing or non-array collection.
pub fn rewrite_references(
    doc: &mut Value,
    mapping: &NameMapping,
    config: &ManifestConfig,
) -> RewriteReport {
    let mut report = RewriteReport::default();

    let Some(records) = doc
        .get_mut(config.collection.as_str())
        .and_then(Value::as_array_mut)
    else {
        debug!(collection = %config.collection, "manifest has no image collection");
        return report;
    };

    for record in records.iter_mut() {
        let Some(Value::String(reference)) = record.get_mut(config.reference_field.as_str())
        else {
            continue;
        };
        if !reference.contains(config.public_prefix.as_str()) {
            continue;
        }

        match mapping.resolve(reference) {
            Some(public_path) if public_path == reference.as_str() => report.unchanged += 1,
            Some(public_path) => {
                *reference = public_path.to_string();
                report.rewritten += 1;
            }
            None => {
                warn!(reference = %reference, "no hashed artifact for image reference");
                report.unresolved.push(reference.clone());
            }
        }
    }

    report
}

/// `<path>.gz`
pub fn gzip_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".gz");
    PathBuf::from(os)
}

/// Replace `path` with `bytes` via a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Gzip `bytes` at maximum compression.
pub fn gzip_bytes(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Write the manifest minified, and its gzip sibling when `gzip` is set.
///
/// With `gzip` off, a stale `<path>.gz` from an earlier run is removed so it
/// cannot be served in place of the new manifest.
pub fn persist_manifest(
    path: &Path,
    doc: &ManifestDocument,
    gzip: bool,
) -> Result<PersistStats, ManifestError> {
    let minified = serde_json::to_vec(&doc.value)?;
    write_atomic(path, &minified)?;

    let gz_path = gzip_path(path);
    let gzip_size = if gzip {
        let compressed = gzip_bytes(&minified)?;
        write_atomic(&gz_path, &compressed)?;
        Some(compressed.len() as u64)
    } else {
        if gz_path.is_file() {
            debug!(path = %gz_path.display(), "removing stale gzip manifest");
            std::fs::remove_file(&gz_path)?;
        }
        None
    };

    Ok(PersistStats {
        original_size: doc.raw_size,
        minified_size: minified.len() as u64,
        gzip_size,
    })
}

/// Minify a manifest in place and write its gzip copy, without rewriting.
pub fn compress_manifest(path: &Path, gzip: bool) -> Result<PersistStats, ManifestError> {
    let doc = load_manifest(path)?;
    persist_manifest(path, &doc, gzip)
}
