//! Pipeline configuration.
//!
//! The size budget, quality bounds and manifest layout are policy knobs, not
//! protocol. They live in an optional `picbake.toml` next to the site sources;
//! every key is optional and overrides the stock default.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! max_dimension = 1080      # Longest output edge in pixels (never upscales)
//! max_file_size = 409600    # Byte budget per output image (400 KiB)
//! min_quality = 50          # Quality floor; oversized output is accepted below it
//! max_quality = 90          # First quality tried
//! quality_step = 2          # Decrement between attempts
//!
//! [manifest]
//! collection = "gallery"    # Top-level array of image records
//! reference_field = "src"   # Field holding the image path in each record
//! public_prefix = "/pic/"   # Public URL prefix of processed images
//! gzip = true               # Also write <manifest>.gz at maximum compression
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Transcoding policy (dimension cap, byte budget, quality search).
    pub images: ImagesConfig,
    /// Where image references live in the manifest and how it is persisted.
    pub manifest: ManifestConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let images = &self.images;
        if images.min_quality == 0 || images.max_quality > 100 {
            return Err(ConfigError::Validation(
                "images quality bounds must be within 1-100".into(),
            ));
        }
        if images.min_quality > images.max_quality {
            return Err(ConfigError::Validation(
                "images.min_quality must not exceed images.max_quality".into(),
            ));
        }
        if images.quality_step == 0 {
            return Err(ConfigError::Validation(
                "images.quality_step must be non-zero".into(),
            ));
        }
        if images.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "images.max_dimension must be non-zero".into(),
            ));
        }
        if images.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "images.max_file_size must be non-zero".into(),
            ));
        }
        let manifest = &self.manifest;
        for (key, value) in [
            ("manifest.collection", &manifest.collection),
            ("manifest.reference_field", &manifest.reference_field),
            ("manifest.public_prefix", &manifest.public_prefix),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Transcoding policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longest output edge in pixels. Smaller images keep their size.
    pub max_dimension: u32,
    /// Byte budget the quality search tries to meet.
    pub max_file_size: u64,
    /// Lowest quality the search will encode at.
    pub min_quality: u32,
    /// Quality of the first attempt.
    pub max_quality: u32,
    /// Amount subtracted from the quality after each oversized attempt.
    pub quality_step: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1080,
            max_file_size: 400 * 1024,
            min_quality: 50,
            max_quality: 90,
            quality_step: 2,
        }
    }
}

/// Manifest layout and persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestConfig {
    /// Top-level key of the array holding image records.
    pub collection: String,
    /// Field inside each record that references an image.
    pub reference_field: String,
    /// Public URL prefix; only references containing it are rewritten.
    pub public_prefix: String,
    /// Write a gzip copy alongside the minified manifest.
    pub gzip: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            collection: "gallery".to_string(),
            reference_field: "src".to_string(),
            public_prefix: "/pic/".to_string(),
            gzip: true,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from the given file, merged on top of stock defaults.
///
/// A missing file yields the defaults. Unknown keys and out-of-range values
/// are errors.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `picbake.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# picbake configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Image transcoding
# ---------------------------------------------------------------------------
[images]
# Longest output edge in pixels. The other edge is scaled proportionally.
# Images already within the bound are never upscaled.
max_dimension = 1080

# Byte budget per output image (400 KiB).
max_file_size = 409600

# Quality search: start at max_quality and step down by quality_step until
# the output fits max_file_size. The search never goes below min_quality;
# an image that still does not fit is kept at min_quality, oversized.
min_quality = 50
max_quality = 90
quality_step = 2

# ---------------------------------------------------------------------------
# Manifest
# ---------------------------------------------------------------------------
[manifest]
# Top-level array holding image records, and the field inside each record
# that references an image.
collection = "gallery"
reference_field = "src"

# Public URL prefix of processed images. Only references containing it
# are rewritten to their hashed names.
public_prefix = "/pic/"

# Also write <manifest>.gz at maximum compression.
gzip = true
"##
}
