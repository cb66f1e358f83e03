//! Removal of superseded, unhashed artifacts.
//!
//! The output directory may hold unhashed WebP files from earlier builds or
//! from a plain copy of the public directory (`town.webp`). Once a hashed
//! sibling (`town-1a2b3c4d.webp`) exists, the unhashed file is superseded and
//! is deleted. An unhashed file without a hashed sibling is never touched: it
//! has no known replacement.
//!
//! Decisions are made against a single [`OutputSnapshot`] of the directory,
//! taken once, so deletions cannot influence later decisions.

use crate::naming::{OUTPUT_EXTENSION, split_hashed_name};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File names present in the output directory at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    files: BTreeSet<String>,
}

/// What the cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    /// `(file name, error)` for deletions that failed.
    pub failed: Vec<(String, String)>,
}

impl OutputSnapshot {
    /// List regular files in `dir`. A missing directory is an empty snapshot.
    pub fn capture(dir: &Path) -> std::io::Result<Self> {
        if !dir.is_dir() {
            return Ok(Self::default());
        }
        let mut files = BTreeSet::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                files.insert(name.to_string());
            }
        }
        Ok(Self { files })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Base names that have at least one hashed artifact in the snapshot.
    fn hashed_bases(&self) -> BTreeSet<&str> {
        self.files
            .iter()
            .filter_map(|name| split_hashed_name(name).map(|(base, _)| base))
            .collect()
    }

    /// Unhashed `*.webp` files whose base name has a hashed sibling.
    pub fn superseded(&self) -> Vec<&str> {
        let hashed = self.hashed_bases();
        let suffix = format!(".{OUTPUT_EXTENSION}");
        self.files
            .iter()
            .filter(|name| split_hashed_name(name).is_none())
            .filter_map(|name| {
                let base = name.strip_suffix(suffix.as_str())?;
                hashed.contains(base).then_some(name.as_str())
            })
            .collect()
    }
}

/// Delete every superseded file listed in `snapshot` from `dir`.
///
/// Failures are logged and collected; they never stop the pass.
pub fn remove_superseded(dir: &Path, snapshot: &OutputSnapshot) -> CleanupReport {
    let mut report = CleanupReport::default();
    for name in snapshot.superseded() {
        let path: PathBuf = dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => report.removed.push(name.to_string()),
            Err(e) => {
                warn!(file = %name, error = %e, "failed to remove superseded file");
                report.failed.push((name.to_string(), e.to_string()));
            }
        }
    }
    report
}
