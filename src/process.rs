//! Pipeline orchestration.
//!
//! Runs the stages strictly in order, one image at a time:
//!
//! ```text
//! 1. Precondition   manifest must exist (fatal otherwise)
//! 2. Scan           source dir  →  [SourceImage]
//! 3. Per image      transcode → hash → write {base}-{hash}.webp → NameMapping
//! 4. Manifest       rewrite references → minified + gzip, atomic replace
//! 5. Cleanup        snapshot output dir → delete superseded unhashed files
//! ```
//!
//! ## Failure containment
//!
//! Each image yields a tagged [`FileOutcome`]; a decode, encode or write
//! failure is recorded and the batch moves on. Unresolved manifest references
//! and failed deletions are warnings. Only a missing or unreadable manifest,
//! an unreadable source directory, or an output directory that cannot be
//! created abort the run.
//!
//! ## Ordering under interruption
//!
//! Nothing is deleted before the new artifacts and the new manifest are on
//! disk. The manifest is replaced atomically. Artifact names are content
//! derived and already-hashed manifest references resolve to the current
//! hash, so re-running after an interruption at any point converges to the
//! same end state.

use crate::cleanup::{CleanupReport, OutputSnapshot, remove_superseded};
use crate::config::PipelineConfig;
use crate::imaging::{
    Dimensions, ImageBackend, Quality, RustBackend, ScaledDimensions, TranscodeMode, transcode,
};
use crate::manifest::{
    ManifestError, NameMapping, PersistStats, RewriteReport, load_manifest, persist_manifest,
    rewrite_references, write_atomic,
};
use crate::naming::HashedArtifact;
use crate::scan::{ScanError, SourceImage, scan};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

impl ProcessError {
    /// True for the "manifest absent before this stage runs" precondition.
    pub fn is_missing_manifest(&self) -> bool {
        matches!(self, ProcessError::Manifest(ManifestError::Missing(_)))
    }
}

/// Filesystem locations the pipeline works on.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    /// Source images (read-only).
    pub source_dir: PathBuf,
    /// Where hashed artifacts are written and superseded files removed.
    pub output_dir: PathBuf,
    /// JSON manifest rewritten in place.
    pub manifest: PathBuf,
}

/// Whether a hashed artifact had to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Written,
    /// A file with the same content-derived name was already present.
    Unchanged,
}

/// A successfully processed image.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub source: String,
    pub artifact: HashedArtifact,
    pub status: ArtifactStatus,
    pub mode: TranscodeMode,
    pub quality: Option<Quality>,
    pub original_dimensions: Option<Dimensions>,
    pub dimensions: Option<ScaledDimensions>,
    pub was_resized: bool,
    pub original_size: u64,
    pub final_size: u64,
    pub within_budget: bool,
}

/// Per-file result.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Processed(ProcessedImage),
    Failed { source: String, error: String },
}

/// Progress notifications, emitted in processing order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    ScanCompleted { image_count: usize },
    ImageProcessed { index: usize, outcome: FileOutcome },
}

/// Result of the image stage (scan, transcode, hash, write).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagesReport {
    pub outcomes: Vec<FileOutcome>,
    pub mapping: NameMapping,
}

impl ImagesReport {
    pub fn processed(&self) -> impl Iterator<Item = &ProcessedImage> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Processed(p) => Some(p),
            FileOutcome::Failed { .. } => None,
        })
    }

    pub fn succeeded(&self) -> usize {
        self.processed().count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_original_size(&self) -> u64 {
        self.processed().map(|p| p.original_size).sum()
    }

    pub fn total_final_size(&self) -> u64 {
        self.processed().map(|p| p.final_size).sum()
    }
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub images: ImagesReport,
    pub rewrite: RewriteReport,
    pub persist: PersistStats,
    pub cleanup: CleanupReport,
}

/// Run the full pipeline with the production backend.
pub fn run(
    paths: &PipelinePaths,
    config: &PipelineConfig,
    on_event: impl FnMut(&ProcessEvent),
) -> Result<PipelineReport, ProcessError> {
    run_with_backend(&RustBackend::new(), paths, config, on_event)
}

/// Run the full pipeline using a specific backend (allows testing with mock).
pub fn run_with_backend<B: ImageBackend>(
    backend: &B,
    paths: &PipelinePaths,
    config: &PipelineConfig,
    on_event: impl FnMut(&ProcessEvent),
) -> Result<PipelineReport, ProcessError> {
    let mut manifest = load_manifest(&paths.manifest)?;

    let images = process_images(backend, &paths.source_dir, &paths.output_dir, config, on_event)?;

    let rewrite = if images.outcomes.is_empty() {
        debug!("no images processed, manifest references left as-is");
        RewriteReport::default()
    } else {
        rewrite_references(&mut manifest.value, &images.mapping, &config.manifest)
    };
    let persist = persist_manifest(&paths.manifest, &manifest, config.manifest.gzip)?;
    info!(
        rewritten = rewrite.rewritten,
        unresolved = rewrite.unresolved.len(),
        path = %paths.manifest.display(),
        "manifest written"
    );

    let cleanup = cleanup_output(&paths.output_dir);

    Ok(PipelineReport {
        images,
        rewrite,
        persist,
        cleanup,
    })
}

/// Scan, transcode, hash and write every source image. The manifest is not
/// touched.
pub fn process_images<B: ImageBackend>(
    backend: &B,
    source_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    mut on_event: impl FnMut(&ProcessEvent),
) -> Result<ImagesReport, ProcessError> {
    let sources = scan(source_dir)?;
    on_event(&ProcessEvent::ScanCompleted {
        image_count: sources.len(),
    });
    if sources.is_empty() {
        return Ok(ImagesReport::default());
    }

    std::fs::create_dir_all(output_dir)?;

    let mut report = ImagesReport::default();
    for (index, source) in sources.iter().enumerate() {
        let outcome = match process_one(backend, source, output_dir, config) {
            Ok(processed) => {
                report.mapping.insert(&processed.artifact);
                FileOutcome::Processed(processed)
            }
            Err(error) => {
                warn!(file = %source.file_name, error = %error, "image processing failed");
                FileOutcome::Failed {
                    source: source.file_name.clone(),
                    error,
                }
            }
        };
        on_event(&ProcessEvent::ImageProcessed {
            index: index + 1,
            outcome: outcome.clone(),
        });
        report.outcomes.push(outcome);
    }

    Ok(report)
}

/// Transcode one image and write its hashed artifact.
fn process_one<B: ImageBackend>(
    backend: &B,
    source: &SourceImage,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<ProcessedImage, String> {
    let transcoded = transcode(backend, source, &config.images).map_err(|e| e.to_string())?;
    let artifact = HashedArtifact::new(
        &source.base_name,
        &transcoded.bytes,
        &config.manifest.public_prefix,
    );
    let status = write_artifact(output_dir, &artifact, &transcoded.bytes).map_err(|e| {
        format!("failed to write {}: {}", artifact.hashed_file_name, e)
    })?;

    if !transcoded.within_budget {
        warn!(
            file = %source.file_name,
            size = transcoded.final_size,
            budget = config.images.max_file_size,
            "output exceeds size budget at minimum quality"
        );
    }

    Ok(ProcessedImage {
        source: source.file_name.clone(),
        artifact,
        status,
        mode: transcoded.mode,
        quality: transcoded.quality,
        original_dimensions: transcoded.original_dimensions,
        dimensions: transcoded.dimensions,
        was_resized: transcoded.was_resized,
        original_size: transcoded.original_size,
        final_size: transcoded.final_size,
        within_budget: transcoded.within_budget,
    })
}

/// Write `bytes` under the artifact's hashed name unless it is already there.
fn write_artifact(
    output_dir: &Path,
    artifact: &HashedArtifact,
    bytes: &[u8],
) -> std::io::Result<ArtifactStatus> {
    let path = output_dir.join(&artifact.hashed_file_name);
    if let Ok(meta) = std::fs::metadata(&path)
        && meta.is_file()
        && meta.len() == bytes.len() as u64
    {
        return Ok(ArtifactStatus::Unchanged);
    }
    write_atomic(&path, bytes)?;
    Ok(ArtifactStatus::Written)
}

/// Snapshot the output directory and remove superseded files.
///
/// An unreadable directory skips cleanup with a warning.
pub fn cleanup_output(output_dir: &Path) -> CleanupReport {
    match OutputSnapshot::capture(output_dir) {
        Ok(snapshot) => remove_superseded(output_dir, &snapshot),
        Err(e) => {
            warn!(dir = %output_dir.display(), error = %e, "cannot list output directory, skipping cleanup");
            CleanupReport::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::naming::split_hashed_name;
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        paths: PipelinePaths,
    }

    impl Fixture {
        fn new(manifest: Option<Value>) -> Self {
            let tmp = TempDir::new().unwrap();
            let paths = PipelinePaths {
                source_dir: tmp.path().join("public/pic"),
                output_dir: tmp.path().join("dist/pic"),
                manifest: tmp.path().join("dist/site-data.json"),
            };
            fs::create_dir_all(&paths.source_dir).unwrap();
            fs::create_dir_all(&paths.output_dir).unwrap();
            if let Some(manifest) = manifest {
                fs::write(
                    &paths.manifest,
                    serde_json::to_string_pretty(&manifest).unwrap(),
                )
                .unwrap();
            }
            Self { _tmp: tmp, paths }
        }

        fn source(&self, name: &str, size: usize) {
            fs::write(self.paths.source_dir.join(name), vec![3u8; size]).unwrap();
        }

        fn output_files(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(&self.paths.output_dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }

        fn manifest(&self) -> Value {
            serde_json::from_str(&fs::read_to_string(&self.paths.manifest).unwrap()).unwrap()
        }
    }

    fn config(max_file_size: u64, min_quality: u32) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.images.max_file_size = max_file_size;
        config.images.min_quality = min_quality;
        config
    }

    fn gallery(srcs: &[&str]) -> Value {
        json!({
            "title": "Server Community",
            "gallery": srcs.iter().map(|s| json!({"src": s, "title": "t"})).collect::<Vec<_>>()
        })
    }

    fn processed(outcome: &FileOutcome) -> &ProcessedImage {
        match outcome {
            FileOutcome::Processed(p) => p,
            FileOutcome::Failed { source, error } => panic!("{source} failed: {error}"),
        }
    }

    #[test]
    fn missing_manifest_is_fatal_before_any_work() {
        let fx = Fixture::new(None);
        fx.source("town.png", 10);
        let backend = MockBackend::new(|_| 10).with_image("town.png", 100, 100);

        let err = run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |_| {})
            .unwrap_err();

        assert!(err.is_missing_manifest());
        assert!(backend.get_operations().is_empty());
        assert!(fx.output_files().is_empty());
    }

    #[test]
    fn large_png_is_scaled_hashed_and_referenced() {
        let fx = Fixture::new(Some(gallery(&["/pic/town.png"])));
        fx.source("town.png", 4096);
        let backend = MockBackend::new(|q| 600 * 1024 - (90 - q as usize) * 10 * 1024)
            .with_image("town.png", 4000, 2000);

        let report =
            run_with_backend(&backend, &fx.paths, &config(500 * 1024, 40), |_| {}).unwrap();

        let image = processed(&report.images.outcomes[0]);
        assert_eq!(
            image.dimensions,
            Some(ScaledDimensions {
                width: 1080,
                height: 540
            })
        );
        assert!(image.final_size <= 500 * 1024);
        let (base, _) = split_hashed_name(&image.artifact.hashed_file_name).unwrap();
        assert_eq!(base, "town");

        assert_eq!(
            fx.manifest()["gallery"][0]["src"],
            json!(image.artifact.public_path)
        );
        assert!(fx.paths.output_dir.join(&image.artifact.hashed_file_name).is_file());
        assert_eq!(report.rewrite.rewritten, 1);
    }

    #[test]
    fn small_webp_copied_and_renamed() {
        let fx = Fixture::new(Some(gallery(&["/pic/logo.webp"])));
        fx.source("logo.webp", 50 * 1024);
        let backend = MockBackend::new(|_| 1);

        let report =
            run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |_| {}).unwrap();

        let image = processed(&report.images.outcomes[0]);
        assert_eq!(image.mode, TranscodeMode::Passthrough);
        assert!(backend.get_operations().is_empty());

        let written = fs::read(fx.paths.output_dir.join(&image.artifact.hashed_file_name)).unwrap();
        assert_eq!(written, vec![3u8; 50 * 1024]);
        assert_eq!(
            report.images.mapping.get("logo"),
            Some(image.artifact.public_path.as_str())
        );
    }

    #[test]
    fn missing_source_reference_left_unchanged() {
        let fx = Fixture::new(Some(gallery(&["/pic/town.png", "/pic/missing.jpg"])));
        fx.source("town.png", 10);
        let backend = MockBackend::new(|_| 100).with_image("town.png", 10, 10);

        let report =
            run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |_| {}).unwrap();

        assert_eq!(fx.manifest()["gallery"][1]["src"], json!("/pic/missing.jpg"));
        assert_eq!(report.rewrite.unresolved, vec!["/pic/missing.jpg".to_string()]);
    }

    #[test]
    fn per_file_failure_does_not_abort_batch() {
        let fx = Fixture::new(Some(gallery(&["/pic/bad.jpg", "/pic/good.png"])));
        fx.source("bad.jpg", 10);
        fx.source("good.png", 10);
        let backend = MockBackend::new(|_| 100)
            .with_image("bad.jpg", 10, 10)
            .with_image("good.png", 10, 10)
            .failing_on("bad.jpg");

        let report =
            run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |_| {}).unwrap();

        assert_eq!(report.images.succeeded(), 1);
        assert_eq!(report.images.failed(), 1);
        assert!(matches!(
            &report.images.outcomes[0],
            FileOutcome::Failed { source, .. } if source == "bad.jpg"
        ));
        assert!(report.images.mapping.get("bad").is_none());
        let manifest = fx.manifest();
        assert_eq!(manifest["gallery"][0]["src"], json!("/pic/bad.jpg"));
        assert!(manifest["gallery"][1]["src"]
            .as_str()
            .unwrap()
            .starts_with("/pic/good-"));
    }

    #[test]
    fn shared_base_name_resolves_to_last_in_order() {
        let fx = Fixture::new(Some(gallery(&["/pic/town.jpg"])));
        fx.source("town.jpg", 10);
        fx.source("town.png", 10);
        let backend = MockBackend::new(|_| 5)
            .with_image("town.jpg", 10, 10)
            .with_image("town.png", 20, 30);

        let report =
            run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |_| {}).unwrap();

        // Both artifacts are written, the mapping keeps town.png (sorted last)
        assert_eq!(report.images.succeeded(), 2);
        let png = processed(&report.images.outcomes[1]);
        assert_eq!(png.source, "town.png");
        assert_eq!(report.images.mapping.len(), 1);
        assert_eq!(fx.manifest()["gallery"][0]["src"], json!(png.artifact.public_path));
    }

    #[test]
    fn second_run_is_stable() {
        let fx = Fixture::new(Some(gallery(&["/pic/town.png", "/pic/logo.webp"])));
        fx.source("town.png", 10);
        fx.source("logo.webp", 10);
        // A stale unhashed copy from the public dir
        fs::write(fx.paths.output_dir.join("logo.webp"), b"old").unwrap();
        let backend = MockBackend::new(|_| 100).with_image("town.png", 2000, 1000);
        let config = PipelineConfig::default();

        let first = run_with_backend(&backend, &fx.paths, &config, |_| {}).unwrap();
        let files_after_first = fx.output_files();
        let manifest_after_first = fs::read(&fx.paths.manifest).unwrap();

        let second = run_with_backend(&backend, &fx.paths, &config, |_| {}).unwrap();

        assert_eq!(first.cleanup.removed, vec!["logo.webp".to_string()]);
        assert!(second.cleanup.removed.is_empty());
        assert_eq!(fx.output_files(), files_after_first);
        assert_eq!(fs::read(&fx.paths.manifest).unwrap(), manifest_after_first);
        assert_eq!(first.images.mapping, second.images.mapping);
        assert!(second
            .images
            .processed()
            .all(|p| p.status == ArtifactStatus::Unchanged));
        assert_eq!(second.rewrite.unchanged, 2);
    }

    #[test]
    fn changed_source_gets_new_hash_on_rerun() {
        let fx = Fixture::new(Some(gallery(&["/pic/logo.webp"])));
        fx.source("logo.webp", 10);
        let backend = MockBackend::new(|_| 1);
        let config = PipelineConfig::default();

        let first = run_with_backend(&backend, &fx.paths, &config, |_| {}).unwrap();
        fs::write(fx.paths.source_dir.join("logo.webp"), b"new logo").unwrap();
        let second = run_with_backend(&backend, &fx.paths, &config, |_| {}).unwrap();

        let old = &processed(&first.images.outcomes[0]).artifact;
        let new = &processed(&second.images.outcomes[0]).artifact;
        assert_ne!(old.hashed_file_name, new.hashed_file_name);
        assert_eq!(fx.manifest()["gallery"][0]["src"], json!(new.public_path));
        assert_eq!(second.rewrite.rewritten, 1);
    }

    #[test]
    fn manifest_minified_with_gzip_sibling() {
        let fx = Fixture::new(Some(gallery(&["/pic/logo.webp"])));
        fx.source("logo.webp", 10);
        let backend = MockBackend::new(|_| 1);

        let report =
            run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |_| {}).unwrap();

        let text = fs::read_to_string(&fx.paths.manifest).unwrap();
        assert!(!text.contains('\n'));
        assert!(!text.contains(": "));
        assert!(text.starts_with(r#"{"title":"Server Community","gallery":"#));
        assert!(crate::manifest::gzip_path(&fx.paths.manifest).is_file());
        assert!(report.persist.gzip_size.is_some());
        assert!(report.persist.minified_size < report.persist.original_size);
    }

    #[test]
    fn empty_source_dir_still_persists_manifest() {
        let fx = Fixture::new(Some(gallery(&["/pic/town.png"])));
        let backend = MockBackend::new(|_| 1);

        let report =
            run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |_| {}).unwrap();

        assert!(report.images.outcomes.is_empty());
        assert!(report.rewrite.unresolved.is_empty());
        assert_eq!(fx.manifest()["gallery"][0]["src"], json!("/pic/town.png"));
    }

    #[test]
    fn events_follow_processing_order() {
        let fx = Fixture::new(Some(gallery(&[])));
        fx.source("b.png", 10);
        fx.source("a.png", 10);
        let backend = MockBackend::new(|_| 5)
            .with_image("a.png", 10, 10)
            .with_image("b.png", 10, 10);

        let mut events = Vec::new();
        run_with_backend(&backend, &fx.paths, &PipelineConfig::default(), |e| {
            events.push(e.clone())
        })
        .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ProcessEvent::ScanCompleted { image_count: 2 });
        let sources: Vec<&str> = events[1..]
            .iter()
            .map(|e| match e {
                ProcessEvent::ImageProcessed {
                    outcome: FileOutcome::Processed(p),
                    ..
                } => p.source.as_str(),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(sources, vec!["a.png", "b.png"]);
    }

    #[test]
    fn process_images_creates_output_dir() {
        let tmp = TempDir::new().unwrap();
        let source_dir = tmp.path().join("src");
        let output_dir = tmp.path().join("out/pic");
        fs::create_dir_all(&source_dir).unwrap();
        fs::write(source_dir.join("a.png"), b"x").unwrap();
        let backend = MockBackend::new(|_| 5).with_image("a.png", 10, 10);

        let report = process_images(
            &backend,
            &source_dir,
            &output_dir,
            &PipelineConfig::default(),
            |_| {},
        )
        .unwrap();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.total_final_size(), 5);
        assert!(output_dir.is_dir());
    }
}
