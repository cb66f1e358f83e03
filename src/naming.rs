//! Content-hashed artifact naming.
//!
//! Output images are named `{base}-{hash}.webp`, where `hash` is the first
//! eight hex characters of the SHA-256 of the output bytes. The name is a pure
//! function of content: the same bytes always produce the same name, on any
//! machine, in any run, so unchanged images keep their URLs (and CDN cache
//! entries) across deploys and changed images always get new ones.
//!
//! ```text
//! town.png  ──transcode──▶  bytes  ──sha256[..8]──▶  town-1a2b3c4d.webp
//! ```

use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of the hash suffix in hex characters.
pub const HASH_LEN: usize = 8;

/// Extension of every produced artifact.
pub const OUTPUT_EXTENSION: &str = "webp";

/// Short content hash: first [`HASH_LEN`] lowercase hex chars of SHA-256.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LEN);
    hex
}

/// A hashed output file and the public path the manifest should reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedArtifact {
    /// Base name of the source file, e.g. `town`.
    pub original_base_name: String,
    /// e.g. `town-1a2b3c4d.webp`
    pub hashed_file_name: String,
    /// e.g. `/pic/town-1a2b3c4d.webp`
    pub public_path: String,
}

impl HashedArtifact {
    pub fn new(base_name: &str, bytes: &[u8], public_prefix: &str) -> Self {
        let hashed_file_name = format!(
            "{}-{}.{}",
            base_name,
            content_hash(bytes),
            OUTPUT_EXTENSION
        );
        let public_path = format!("{}{}", public_prefix, hashed_file_name);
        Self {
            original_base_name: base_name.to_string(),
            hashed_file_name,
            public_path,
        }
    }
}

fn is_hash(s: &str) -> bool {
    s.len() == HASH_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Split `{base}-{8 hex}` into `(base, hash)`.
///
/// Returns `None` when the stem carries no hash suffix or the base is empty.
pub fn split_hash_suffix(stem: &str) -> Option<(&str, &str)> {
    let (base, hash) = stem.rsplit_once('-')?;
    (!base.is_empty() && is_hash(hash)).then_some((base, hash))
}

/// Split a hashed artifact file name `{base}-{8 hex}.webp` into `(base, hash)`.
pub fn split_hashed_name(file_name: &str) -> Option<(&str, &str)> {
    let stem = file_name.strip_suffix(".webp")?;
    split_hash_suffix(stem)
}

/// Base name of an image reference: directory, query/fragment and extension
/// stripped. `/pic/town.png?v=2` → `town`.
pub fn base_name_of(reference: &str) -> Option<&str> {
    let path = reference.split(['?', '#']).next()?;
    let stem = Path::new(path).file_stem()?.to_str()?;
    (!stem.is_empty()).then_some(stem)
}
