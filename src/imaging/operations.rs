//! High-level transcoding: dimension policy + quality search over a backend.
//!
//! [`transcode`] is the only entry point the pipeline uses. It either passes a
//! source through untouched (already WebP and within budget) or decodes it
//! once, scales it to the max-edge constraint, and walks the quality ladder
//! from high to low until an encode fits the byte budget.
//!
//! The search is linear and strictly descending rather than a bisection:
//! encoded size is not monotonic in quality for every input, so the first
//! passing value from the top is the one we want.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{ScaledDimensions, quality_ladder, scaled_dimensions};
use super::params::{Quality, ScaleParams};
use crate::config::ImagesConfig;
use crate::scan::SourceImage;

/// How a transcoded buffer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeMode {
    /// Decoded, scaled and re-encoded through the quality search.
    Encoded,
    /// Source was already WebP within budget; bytes copied verbatim.
    Passthrough,
}

/// A successfully transcoded image and what it took to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodedImage {
    pub bytes: Vec<u8>,
    pub mode: TranscodeMode,
    /// Quality of the accepted encode. `None` for passthrough.
    pub quality: Option<Quality>,
    /// Source pixel size. `None` for passthrough (never decoded).
    pub original_dimensions: Option<Dimensions>,
    /// Output pixel size. `None` for passthrough.
    pub dimensions: Option<ScaledDimensions>,
    pub was_resized: bool,
    pub original_size: u64,
    pub final_size: u64,
    /// Encode attempts made by the quality search (0 for passthrough).
    pub attempts: usize,
    /// False when even `min_quality` could not meet the budget.
    pub within_budget: bool,
}

/// Result of walking the quality ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub bytes: Vec<u8>,
    pub quality: Quality,
    pub attempts: usize,
    pub within_budget: bool,
}

/// Walk the quality ladder from `max_quality` down, returning the first
/// encode that fits `max_file_size`, or the `min_quality` encode if none does.
///
/// Generic over the encode step so the loop can be exercised without pixels.
pub fn search_quality<E>(
    config: &ImagesConfig,
    mut encode: impl FnMut(Quality) -> Result<Vec<u8>, E>,
) -> Result<SearchOutcome, E> {
    let ladder = quality_ladder(config.max_quality, config.min_quality, config.quality_step);
    let (floor, upper) = match ladder.split_last() {
        Some((&floor, upper)) => (floor, upper),
        None => (config.min_quality, &[][..]),
    };

    for (attempt, &value) in upper.iter().enumerate() {
        let quality = Quality::new(value);
        let bytes = encode(quality)?;
        if bytes.len() as u64 <= config.max_file_size {
            return Ok(SearchOutcome {
                bytes,
                quality,
                attempts: attempt + 1,
                within_budget: true,
            });
        }
    }

    // Last rung: accepted whether or not it fits
    let quality = Quality::new(floor);
    let bytes = encode(quality)?;
    Ok(SearchOutcome {
        within_budget: bytes.len() as u64 <= config.max_file_size,
        bytes,
        quality,
        attempts: upper.len() + 1,
    })
}

/// Transcode one source image according to `config`.
///
/// Errors are returned, not logged: the caller records them per file and
/// moves on to the next image.
pub fn transcode<B: ImageBackend>(
    backend: &B,
    source: &SourceImage,
    config: &ImagesConfig,
) -> Result<TranscodedImage, BackendError> {
    if source.is_webp() && source.byte_size <= config.max_file_size {
        let bytes = std::fs::read(&source.path)?;
        let size = bytes.len() as u64;
        return Ok(TranscodedImage {
            bytes,
            mode: TranscodeMode::Passthrough,
            quality: None,
            original_dimensions: None,
            dimensions: None,
            was_resized: false,
            original_size: size,
            final_size: size,
            attempts: 0,
            within_budget: true,
        });
    }

    let original = source.dimensions(backend)?;
    let scaled = scaled_dimensions(original.width, original.height, config.max_dimension);
    let image = backend.load_scaled(
        &source.path,
        &ScaleParams {
            width: scaled.width,
            height: scaled.height,
        },
    )?;

    let outcome = search_quality(config, |quality| backend.encode(&image, quality))?;

    Ok(TranscodedImage {
        final_size: outcome.bytes.len() as u64,
        bytes: outcome.bytes,
        mode: TranscodeMode::Encoded,
        quality: Some(outcome.quality),
        original_dimensions: Some(original),
        dimensions: Some(scaled),
        was_resized: scaled.was_resized((original.width, original.height)),
        original_size: source.byte_size,
        attempts: outcome.attempts,
        within_budget: outcome.within_budget,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::calculations::max_encode_attempts;
    use std::convert::Infallible;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(max_file_size: u64, min_quality: u32, step: u32) -> ImagesConfig {
        ImagesConfig {
            max_dimension: 1080,
            max_file_size,
            min_quality,
            max_quality: 90,
            quality_step: step,
        }
    }

    fn source_file(dir: &Path, name: &str, contents: &[u8]) -> SourceImage {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        SourceImage::from_path(&path).unwrap()
    }

    // =========================================================================
    // search_quality
    // =========================================================================

    #[test]
    fn search_stops_at_first_fit() {
        // size = quality * 10; budget 700 → first fit at quality 70
        let cfg = config(700, 40, 5);
        let mut tried = Vec::new();
        let outcome = search_quality(&cfg, |q| {
            tried.push(q.value());
            Ok::<_, Infallible>(vec![0; q.value() as usize * 10])
        })
        .unwrap();

        assert_eq!(outcome.quality.value(), 70);
        assert!(outcome.within_budget);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(tried, vec![90, 85, 80, 75, 70]);
    }

    #[test]
    fn search_accepts_floor_when_budget_unreachable() {
        let cfg = config(10, 40, 5);
        let outcome =
            search_quality(&cfg, |q| Ok::<_, Infallible>(vec![0; q.value() as usize])).unwrap();

        assert_eq!(outcome.quality.value(), 40);
        assert!(!outcome.within_budget);
        assert_eq!(outcome.bytes.len(), 40);
        assert_eq!(outcome.attempts, max_encode_attempts(90, 40, 5));
    }

    #[test]
    fn search_takes_first_passing_value_not_best() {
        // Non-monotonic: 86 fits, 84 would be even smaller, but 86 comes first
        let cfg = config(100, 50, 2);
        let outcome = search_quality(&cfg, |q| {
            let size = match q.value() {
                86 => 90,
                84 => 10,
                _ => 500,
            };
            Ok::<_, Infallible>(vec![0; size])
        })
        .unwrap();
        assert_eq!(outcome.quality.value(), 86);
    }

    #[test]
    fn search_never_exceeds_attempt_bound() {
        for (min, step) in [(50, 2), (40, 5), (50, 3), (1, 7), (90, 1)] {
            let cfg = config(0, min, step);
            let mut calls = 0;
            let outcome = search_quality(&cfg, |_| {
                calls += 1;
                Ok::<_, Infallible>(vec![0; 1])
            })
            .unwrap();
            assert!(calls <= max_encode_attempts(90, min, step));
            assert_eq!(outcome.quality.value(), min);
        }
    }

    #[test]
    fn search_single_rung_ladder() {
        // max == min: one attempt, accepted even when oversized
        let cfg = config(1, 90, 5);
        let outcome =
            search_quality(&cfg, |q| Ok::<_, Infallible>(vec![0; q.value() as usize])).unwrap();

        assert_eq!(outcome.quality.value(), 90);
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.within_budget);
    }

    #[test]
    fn search_floor_within_budget_is_flagged() {
        // Only the floor fits
        let cfg = config(50, 50, 20);
        let outcome =
            search_quality(&cfg, |q| Ok::<_, Infallible>(vec![0; q.value() as usize])).unwrap();

        assert_eq!(outcome.quality.value(), 50);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.within_budget);
    }

    #[test]
    fn search_propagates_encode_error() {
        let cfg = config(100, 50, 2);
        let result = search_quality(&cfg, |_| Err::<Vec<u8>, _>("encoder crashed"));
        assert_eq!(result.unwrap_err(), "encoder crashed");
    }

    // =========================================================================
    // transcode
    // =========================================================================

    #[test]
    fn large_png_is_scaled_and_searched() {
        let tmp = TempDir::new().unwrap();
        let source = source_file(tmp.path(), "town.png", &[7; 2048]);

        // 600 KB at q90, shrinking 10 KB per quality point below that
        let backend = MockBackend::new(|q| 600 * 1024 - (90 - q as usize) * 10 * 1024)
            .with_image("town.png", 4000, 2000);
        let cfg = config(500 * 1024, 40, 2);

        let result = transcode(&backend, &source, &cfg).unwrap();

        assert_eq!(result.mode, TranscodeMode::Encoded);
        assert_eq!(
            result.dimensions,
            Some(ScaledDimensions {
                width: 1080,
                height: 540
            })
        );
        assert!(result.was_resized);
        // 600 - 10 * 10 = 500 KB at q80
        assert_eq!(result.quality, Some(Quality::new(80)));
        assert!(result.within_budget);
        assert_eq!(result.final_size, 500 * 1024);
        assert_eq!(result.original_size, 2048);

        let ops = backend.get_operations();
        assert!(matches!(&ops[0], RecordedOp::Identify(name) if name == "town.png"));
        assert!(matches!(
            &ops[1],
            RecordedOp::LoadScaled {
                width: 1080,
                height: 540,
                ..
            }
        ));
        // Decoded once, encoded per attempt
        assert_eq!(backend.encode_qualities(), vec![90, 88, 86, 84, 82, 80]);
    }

    #[test]
    fn small_image_keeps_dimensions() {
        let tmp = TempDir::new().unwrap();
        let source = source_file(tmp.path(), "icon.png", &[1; 64]);
        let backend = MockBackend::new(|_| 1000).with_image("icon.png", 256, 256);

        let result = transcode(&backend, &source, &config(400 * 1024, 50, 2)).unwrap();

        assert!(!result.was_resized);
        assert_eq!(result.quality, Some(Quality::new(90)));
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn small_webp_passes_through_without_encoding() {
        let tmp = TempDir::new().unwrap();
        let contents = b"RIFF....WEBPVP8 fake";
        let source = source_file(tmp.path(), "logo.webp", contents);
        let backend = MockBackend::new(|_| 1);

        let result = transcode(&backend, &source, &config(400 * 1024, 50, 2)).unwrap();

        assert_eq!(result.mode, TranscodeMode::Passthrough);
        assert_eq!(result.bytes, contents);
        assert_eq!(result.quality, None);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn oversized_webp_is_reencoded() {
        let tmp = TempDir::new().unwrap();
        let source = source_file(tmp.path(), "banner.webp", &[0; 300]);
        let backend = MockBackend::new(|_| 100).with_image("banner.webp", 2000, 1000);

        let result = transcode(&backend, &source, &config(200, 50, 2)).unwrap();

        assert_eq!(result.mode, TranscodeMode::Encoded);
        assert_eq!(result.final_size, 100);
    }

    #[test]
    fn decode_failure_is_returned() {
        let tmp = TempDir::new().unwrap();
        let source = source_file(tmp.path(), "bad.jpg", b"garbage");
        let backend = MockBackend::new(|_| 1)
            .with_image("bad.jpg", 100, 100)
            .failing_on("bad.jpg");

        let result = transcode(&backend, &source, &config(400 * 1024, 50, 2));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
        assert!(backend.encode_qualities().is_empty());
    }
}
