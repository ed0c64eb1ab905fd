//! Video handler - same four-step shape as images, delegating all codec
//! work to ffmpeg. Operations ffmpeg cannot perform degrade to skipped
//! steps instead of failing the handler.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::media::{FfmpegCodec, MediaProbe, mime_for_extension};
use crate::models::StepResult;
use crate::processors::{
    ProcessJob, TypeHandler, optimize_step, run_step, thumbnail_step, web_version_step,
};

pub struct VideoHandler {
    probe: Arc<dyn MediaProbe>,
}

impl VideoHandler {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

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
        Ok(result)
    }
}

impl TypeHandler for VideoHandler {
    fn process(&self, job: &ProcessJob) -> Result<Vec<StepResult>> {
        if !job.source.is_file() {
            anyhow::bail!("source {:?} vanished before processing", job.source);
        }

        let probe = self.probe.as_ref();
        let mut results = Vec::new();

        if job.options.generate_thumbnails {
            results.push(run_step("generate_thumbnails", || thumbnail_step(probe, job)));
        }
        if job.options.create_web_versions {
            results.push(run_step("create_web_versions", || {
                web_version_step(probe, job, "mp4")
            }));
        }
        if job.options.extract_metadata {
            results.push(run_step("extract_metadata", || self.extract_metadata(job)));
        }
        if job.options.quality_analysis {
            results.push(StepResult::skipped(
                "quality_analysis",
                "not supported for video",
            ));
        }
        if job.options.optimize_original {
            if FfmpegCodec::available() {
                results.push(run_step("optimize_original", || optimize_step(probe, job)));
            } else {
                results.push(StepResult::skipped(
                    "optimize_original",
                    "ffmpeg not available",
                ));
            }
        }
        Ok(results)
    }
}
