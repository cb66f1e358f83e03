//! # picbake
//!
//! Build-time image pipeline for a static site. After the site build has
//! produced `dist/`, picbake turns the raster images into size-budgeted WebP
//! files with content-hashed names, points the page-data manifest at them,
//! removes superseded copies, and ships the manifest minified with a gzip
//! sibling.
//!
//! # Architecture: One Sequential Pass
//!
//! ```text
//! 1. Scan        public/pic/         →  [SourceImage]
//! 2. Transcode   SourceImage         →  WebP bytes   (≤ 1080px, ≤ 400 KiB)
//! 3. Name        bytes               →  town-1a2b3c4d.webp
//! 4. Sync        site-data.json      →  references rewritten, minified + .gz
//! 5. Cleanup     dist/pic/           →  superseded unhashed files removed
//! ```
//!
//! Images are processed one at a time, in file-name order. A failure on one
//! image is recorded and the batch moves on; the site deploys with whatever
//! succeeded.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Lists eligible source images in deterministic order |
//! | [`imaging`] | Dimension policy, quality search, and the `image`/`webp` backend |
//! | [`naming`] | Content hash and `{base}-{hash}.webp` naming |
//! | [`manifest`] | Reference rewrite, minified + gzip persistence |
//! | [`cleanup`] | Snapshot-based removal of superseded artifacts |
//! | [`process`] | Orchestration of the stages above |
//! | [`config`] | `picbake.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Names
//!
//! The hash is derived from the output bytes only. Unchanged images keep
//! their URL across deploys, so CDN and browser caches stay warm; changed
//! images get a new URL, so nothing stale is ever served. Re-running the
//! pipeline on its own output is a no-op.
//!
//! ## Budget, Not Quality
//!
//! The knob that matters for page weight is bytes, so quality is searched
//! downward from 90 until the encode fits the budget, and never below 50.
//! An image that cannot fit at the floor ships oversized with a warning
//! rather than degraded further.
//!
//! ## The Manifest Belongs to Someone Else
//!
//! Only `gallery[*].src` (configurable) is rewritten. Every other value,
//! including references that cannot be resolved, is written back as read.

pub mod cleanup;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
