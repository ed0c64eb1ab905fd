//! Type handlers - per-type derivative step sequences.
//!
//! This module contains the following submodules:
//! - `image`: thumbnails, web version, EXIF metadata, guarded optimize
//! - `video`: the same four-step shape via the ffmpeg codec
//! - `document`: metadata-only shape (no document codec is wired in)
//! - `generic`: file-stat fallback for unrecognized kinds

pub mod document;
pub mod generic;
pub mod image;
pub mod video;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;
use serde_json::{Value, json};

use crate::config::{PipelineConfig, ProcessingOptions};
use crate::guard::{MutationOutcome, SafeMutationGuard};
use crate::media::{FfmpegCodec, ImageCodec, MediaProbe};
use crate::models::{Artifact, FileType, StepResult};

pub use document::DocumentHandler;
pub use generic::GenericHandler;
pub use image::ImageHandler;
pub use video::VideoHandler;

/// Everything one handler invocation needs, owned so it can cross the
/// blocking-pool boundary.
#[derive(Debug, Clone)]
pub struct ProcessJob {
    pub source: PathBuf,
    /// Per-asset directory derivative files are written into.
    pub derivative_dir: PathBuf,
    pub original_size: u64,
    pub options: ProcessingOptions,
    pub config: PipelineConfig,
}

impl ProcessJob {
    pub fn derivative_path(&self, label: &str, ext: &str) -> PathBuf {
        self.derivative_dir.join(format!("{}.{}", label, ext))
    }
}

/// One per-type step sequence. A returned `Err` is a handler-level
/// failure and fails the whole invocation; individual step failures are
/// captured inside the result list instead.
pub trait TypeHandler: Send + Sync {
    fn process(&self, job: &ProcessJob) -> Result<Vec<StepResult>>;
}

/// The registered handlers, one per [`FileType`] variant.
pub struct HandlerSet {
    image: ImageHandler,
    video: VideoHandler,
    document: DocumentHandler,
    generic: GenericHandler,
}

impl Default for HandlerSet {
    fn default() -> Self {
        Self {
            image: ImageHandler::new(Arc::new(ImageCodec)),
            video: VideoHandler::new(Arc::new(FfmpegCodec)),
            document: DocumentHandler::default(),
            generic: GenericHandler::default(),
        }
    }
}

impl HandlerSet {
    /// Swap the image codec out, mainly for failure-injection in tests.
    pub fn with_image_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.image = ImageHandler::new(probe);
        self
    }

    pub fn handler_for(&self, file_type: FileType) -> &dyn TypeHandler {
        match file_type {
            FileType::Image => &self.image,
            FileType::Video => &self.video,
            FileType::Document => &self.document,
            FileType::Generic => &self.generic,
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Step helpers shared across handlers
// ────────────────────────────────────────────────────────────────

/// Run one step, converting its error into a failed `StepResult` so it
/// never aborts sibling steps.
pub(crate) fn run_step<F>(step: &str, body: F) -> StepResult
where
    F: FnOnce() -> Result<StepResult>,
{
    match body() {
        Ok(result) => result,
        Err(err) => {
            warn!("step `{}` failed: {:#}", step, err);
            StepResult::failed(step, &err)
        }
    }
}

/// Fixed-size thumbnail fan-out. Each size is attempted independently; a
/// failure on one size never prevents the others, and any failed size
/// marks the step failed while keeping the successful artifacts.
pub(crate) fn thumbnail_step(probe: &dyn MediaProbe, job: &ProcessJob) -> Result<StepResult> {
    use rayon::prelude::*;

    let outcomes: Vec<(&str, u32, u32, Result<Option<Artifact>>)> =
        crate::common::MEDIA_RAYON_POOL.install(|| {
            crate::common::THUMBNAIL_SIZES
                .par_iter()
                .map(|&(width, height, label)| {
                    let dst = job.derivative_path(&format!("thumb_{}", label), "jpg");
                    let produced = probe
                        .resize(&job.source, &dst, width, height)
                        .context(format!("{}x{} thumbnail", width, height))
                        .map(|supported| {
                            supported.then(|| {
                                let size = std::fs::metadata(&dst).map(|m| m.len()).ok();
                                let mut artifact = Artifact::new(label, dst)
                                    .with_dimensions(width, height);
                                artifact.size = size;
                                artifact
                            })
                        });
                    (label, width, height, produced)
                })
                .collect()
        });

    // All sizes unsupported by this codec: the step is a skip, not a failure.
    if outcomes
        .iter()
        .all(|(_, _, _, outcome)| matches!(outcome, Ok(None)))
    {
        return Ok(StepResult::skipped(
            "generate_thumbnails",
            "codec cannot resize this input",
        ));
    }

    let mut result = StepResult::success("generate_thumbnails");
    let mut failures = Vec::new();
    for (label, width, height, outcome) in outcomes {
        match outcome {
            Ok(Some(artifact)) => result.artifacts.push(artifact),
            Ok(None) => {}
            Err(err) => {
                warn!(
                    "thumbnail {} ({}x{}) failed for {:?}: {:#}",
                    label, width, height, job.source, err
                );
                failures.push(json!({ "label": label, "error": format!("{err:#}") }));
            }
        }
    }

    if !failures.is_empty() {
        result.outcome = crate::models::StepOutcome::Failed;
        result.error_detail = Some(format!("{} thumbnail size(s) failed", failures.len()));
        result
            .details
            .insert("failed_sizes".to_string(), Value::Array(failures));
    }
    Ok(result)
}

/// One compressed rendition alongside the original, reporting
/// `size_reduction = 1 - new/original`.
pub(crate) fn web_version_step(probe: &dyn MediaProbe, job: &ProcessJob, ext: &str) -> Result<StepResult> {
    let dst = job.derivative_path("web", ext);
    if !probe
        .reencode(&job.source, &dst, job.config.web_quality)
        .context("web version re-encode")?
    {
        return Ok(StepResult::skipped(
            "create_web_versions",
            "codec cannot re-encode this input",
        ));
    }

    let new_size = std::fs::metadata(&dst)
        .context(format!("failed to stat web version {:?}", dst))?
        .len();
    let size_reduction = if job.original_size > 0 {
        1.0 - (new_size as f64) / (job.original_size as f64)
    } else {
        0.0
    };

    Ok(StepResult::success("create_web_versions")
        .with_artifact(Artifact::new("web", dst).with_size(new_size))
        .with_detail("size_reduction", json!(size_reduction)))
}

/// Destructive in-place recompression under [`SafeMutationGuard`].
/// Commits only above the configured reduction threshold; anything less
/// is auto-reverted and still reported as a successful (rejected) step.
pub(crate) fn optimize_step(probe: &dyn MediaProbe, job: &ProcessJob) -> Result<StepResult> {
    let quality = job.config.optimize_quality;
    let min_reduction = job.config.min_optimize_reduction;

    let guard = SafeMutationGuard::snapshot(&job.source)?;
    let outcome = guard.attempt(
        |path| {
            let staged = staged_path(path);
            let supported = probe
                .reencode(path, &staged, quality)
                .context("in-place re-encode")?;
            if !supported {
                let _ = std::fs::remove_file(&staged);
                anyhow::bail!("codec cannot re-encode {:?}", path);
            }
            std::fs::rename(&staged, path)
                .context(format!("failed to move optimized file over {:?}", path))?;
            Ok(())
        },
        |before, after| (after as f64) < (before as f64) * (1.0 - min_reduction),
    )?;

    let final_size = std::fs::metadata(&job.source)
        .context(format!("failed to stat {:?} after optimize", job.source))?
        .len();
    let committed = outcome == MutationOutcome::Committed;
    let size_reduction = if committed && job.original_size > 0 {
        1.0 - (final_size as f64) / (job.original_size as f64)
    } else {
        0.0
    };

    Ok(StepResult::success("optimize_original")
        .with_detail("committed", json!(committed))
        .with_detail("size_reduction", json!(size_reduction))
        .with_detail("final_size", json!(final_size)))
}

// Keeps the real extension last so codecs can still infer the output format.
fn staged_path(source: &std::path::Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("staged");
    match source.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => source.with_file_name(format!("{}.opt.{}", stem, ext)),
        None => source.with_file_name(format!("{}.opt", stem)),
    }
}
