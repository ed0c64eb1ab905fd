//! Image handler - thumbnails, web rendition, metadata extraction,
//! optional quality analysis and guarded in-place optimization.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::media::{MediaProbe, mime_for_extension};
use crate::models::StepResult;
use crate::processors::{
    ProcessJob, TypeHandler, optimize_step, run_step, thumbnail_step, web_version_step,
};

pub struct ImageHandler {
    probe: Arc<dyn MediaProbe>,
}

impl ImageHandler {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    /// Intrinsic width/height/mime plus best-effort EXIF. Any extraction
    /// failure degrades to a partial map; this step never fails outright.
    fn extract_metadata(&self, job: &ProcessJob) -> Result<StepResult> {
        let mut result = StepResult::success("extract_metadata");
        result.details.insert("size".to_string(), json!(job.original_size));

        match self.probe.read_dimensions(&job.source) {
            Some(dims) => {
                result.details.insert("width".to_string(), json!(dims.width));
                result.details.insert("height".to_string(), json!(dims.height));
                result.details.insert("mime".to_string(), json!(dims.mime));
            }
            None => {
                result
                    .details
                    .insert("mime".to_string(), json!(mime_for_extension(&job.source)));
            }
        }

        if let Some(exif) = self.probe.read_exif(&job.source) {
            if !exif.is_empty() {
                result.details.insert("exif".to_string(), json!(exif));
            }
        }
        Ok(result)
    }

    /// Cheap quality proxies: pixel count and compression density.
    fn analyze_quality(&self, job: &ProcessJob) -> Result<StepResult> {
        match self.probe.read_dimensions(&job.source) {
            Some(dims) if dims.width > 0 && dims.height > 0 => {
                let pixels = u64::from(dims.width) * u64::from(dims.height);
                Ok(StepResult::success("quality_analysis")
                    .with_detail("megapixels", json!(pixels as f64 / 1.0e6))
                    .with_detail(
                        "bytes_per_pixel",
                        json!(job.original_size as f64 / pixels as f64),
                    ))
            }
            _ => Ok(StepResult::skipped(
                "quality_analysis",
                "no intrinsic dimensions",
            )),
        }
    }
}

impl TypeHandler for ImageHandler {
    fn process(&self, job: &ProcessJob) -> Result<Vec<StepResult>> {
        // The source vanishing between the access check and here is a
        // handler-level failure, not a step failure.
        if !job.source.is_file() {
            anyhow::bail!("source {:?} vanished before processing", job.source);
        }

        let probe = self.probe.as_ref();
        let mut results = Vec::new();

        // Fixed order: metadata must be read from the pre-optimization bytes.
        if job.options.generate_thumbnails {
            results.push(run_step("generate_thumbnails", || thumbnail_step(probe, job)));
        }
        if job.options.create_web_versions {
            results.push(run_step("create_web_versions", || {
                web_version_step(probe, job, "jpg")
            }));
        }
        if job.options.extract_metadata {
            results.push(run_step("extract_metadata", || self.extract_metadata(job)));
        }
        if job.options.quality_analysis {
            results.push(run_step("quality_analysis", || self.analyze_quality(job)));
        }
        if job.options.optimize_original {
            results.push(run_step("optimize_original", || optimize_step(probe, job)));
        }
        Ok(results)
    }
}
