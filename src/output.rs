//! CLI output formatting for all pipeline stages.
//!
//! # Output Format
//!
//! ## Images
//!
//! ```text
//! Images (2 found)
//! 001 logo.webp → logo-9f3e21aa.webp
//!     Copied: already WebP within budget
//!     Size: 48.0 KB
//! 002 town.png → town-1a2b3c4d.webp
//!     Resized: 4000x2000 → 1080x540
//!     Quality: 80
//!     Size: 2.40 MB → 500.0 KB (-79.7%)
//! 003 broken.jpg
//!     Failed: Processing failed: corrupt data
//! ```
//!
//! ## Summary
//!
//! ```text
//! Processed 2 images, 1 failed
//! Total: 2.45 MB → 548.0 KB (-78.2%)
//! References: 2 rewritten, 0 unchanged, 1 unresolved
//! Cleanup: 1 superseded file removed
//! Warning: 1 image failed; deploying with the images that succeeded
//! ```
//!
//! ## Manifest
//!
//! ```text
//! Manifest: 12.40 KB → 8.10 KB minified (-34.7%)
//!     gzip: 2.30 KB (18.5% of original)
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::cleanup::CleanupReport;
use crate::imaging::TranscodeMode;
use crate::manifest::{PersistStats, RewriteReport};
use crate::process::{
    ArtifactStatus, FileOutcome, ImagesReport, PipelineReport, ProcessEvent, ProcessedImage,
};

// ============================================================================
// Shared helpers
// ============================================================================

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable size: KB below one megabyte, MB above.
fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.2} MB", b / MB)
    }
}

/// Signed size change relative to `before`, e.g. `-79.7%`.
fn format_change(before: u64, after: u64) -> String {
    if before == 0 {
        return "n/a".to_string();
    }
    let pct = (after as f64 - before as f64) / before as f64 * 100.0;
    format!("{:+.1}%", pct)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

// ============================================================================
// Stage 1: Images
// ============================================================================

fn processed_lines(index: usize, image: &ProcessedImage) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} → {}",
        format_index(index),
        image.source,
        image.artifact.hashed_file_name
    )];

    match image.mode {
        TranscodeMode::Passthrough => {
            lines.push("    Copied: already WebP within budget".to_string());
            lines.push(format!("    Size: {}", format_size(image.final_size)));
        }
        TranscodeMode::Encoded => {
            match (image.original_dimensions, image.dimensions) {
                (Some(original), Some(scaled)) if image.was_resized => lines.push(format!(
                    "    Resized: {}x{} → {}x{}",
                    original.width, original.height, scaled.width, scaled.height
                )),
                (_, Some(scaled)) => lines.push(format!(
                    "    Dimensions: {}x{}",
                    scaled.width, scaled.height
                )),
                _ => {}
            }
            if let Some(quality) = image.quality {
                let note = if image.within_budget {
                    ""
                } else {
                    " (over budget at minimum quality)"
                };
                lines.push(format!("    Quality: {}{}", quality.value(), note));
            }
            lines.push(format!(
                "    Size: {} → {} ({})",
                format_size(image.original_size),
                format_size(image.final_size),
                format_change(image.original_size, image.final_size)
            ));
        }
    }

    if image.status == ArtifactStatus::Unchanged {
        lines.push("    Output: already present".to_string());
    }
    lines
}

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::ScanCompleted { image_count } => {
            vec![format!("Images ({} found)", image_count)]
        }
        ProcessEvent::ImageProcessed { index, outcome } => match outcome {
            FileOutcome::Processed(image) => processed_lines(*index, image),
            FileOutcome::Failed { source, error } => vec![
                format!("{} {}", format_index(*index), source),
                format!("    Failed: {}", error),
            ],
        },
    }
}

/// Print a progress event to stdout.
pub fn print_process_event(event: &ProcessEvent) {
    for line in format_process_event(event) {
        println!("{}", line);
    }
}

/// Counts and byte totals of the image stage.
pub fn format_images_summary(images: &ImagesReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Processed {}, {} failed",
        plural(images.succeeded(), "image", "images"),
        images.failed()
    )];
    if images.succeeded() > 0 {
        let before = images.total_original_size();
        let after = images.total_final_size();
        lines.push(format!(
            "Total: {} → {} ({})",
            format_size(before),
            format_size(after),
            format_change(before, after)
        ));
    }
    lines
}

fn rewrite_line(rewrite: &RewriteReport) -> String {
    format!(
        "References: {} rewritten, {} unchanged, {} unresolved",
        rewrite.rewritten,
        rewrite.unchanged,
        rewrite.unresolved.len()
    )
}

/// Cleanup result, including failed deletions.
pub fn format_cleanup(cleanup: &CleanupReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Cleanup: {} removed",
        plural(cleanup.removed.len(), "superseded file", "superseded files")
    )];
    for (name, error) in &cleanup.failed {
        lines.push(format!("    Could not remove {}: {}", name, error));
    }
    lines
}

fn failure_warning(images: &ImagesReport) -> Option<String> {
    let failed = images.failed();
    (failed > 0).then(|| {
        format!(
            "Warning: {} failed; deploying with the images that succeeded",
            plural(failed, "image", "images")
        )
    })
}

/// Summary of a full pipeline run.
pub fn format_summary(report: &PipelineReport) -> Vec<String> {
    let mut lines = format_images_summary(&report.images);
    lines.push(rewrite_line(&report.rewrite));
    lines.extend(format_cleanup(&report.cleanup));
    lines.extend(failure_warning(&report.images));
    lines
}

/// Print the full-run summary to stdout.
pub fn print_summary(report: &PipelineReport) {
    for line in format_summary(report) {
        println!("{}", line);
    }
}

/// Summary of an images-only run.
pub fn format_images_only_summary(images: &ImagesReport, cleanup: &CleanupReport) -> Vec<String> {
    let mut lines = format_images_summary(images);
    lines.extend(format_cleanup(cleanup));
    lines.extend(failure_warning(images));
    lines
}

pub fn print_images_only_summary(images: &ImagesReport, cleanup: &CleanupReport) {
    for line in format_images_only_summary(images, cleanup) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Manifest
// ============================================================================

/// Manifest sizes in KB, with reductions relative to the original file.
pub fn format_persist_stats(stats: &PersistStats) -> Vec<String> {
    let kb = |b: u64| format!("{:.2} KB", b as f64 / KB);
    let mut lines = vec![format!(
        "Manifest: {} → {} minified ({})",
        kb(stats.original_size),
        kb(stats.minified_size),
        format_change(stats.original_size, stats.minified_size)
    )];
    if let Some(gzip) = stats.gzip_size {
        let share = if stats.original_size == 0 {
            "n/a".to_string()
        } else {
            format!("{:.1}%", gzip as f64 / stats.original_size as f64 * 100.0)
        };
        lines.push(format!("    gzip: {} ({} of original)", kb(gzip), share));
    }
    lines
}

pub fn print_persist_stats(stats: &PersistStats) {
    for line in format_persist_stats(stats) {
        println!("{}", line);
    }
}
