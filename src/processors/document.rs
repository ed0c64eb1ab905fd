//! Document handler - keeps the four-step shape, but no document codec is
//! wired in, so everything except metadata reports skipped.

use anyhow::Result;
use serde_json::json;

use crate::media::mime_for_extension;
use crate::models::StepResult;
use crate::processors::{ProcessJob, TypeHandler, run_step};

#[derive(Debug, Default)]
pub struct DocumentHandler;

impl TypeHandler for DocumentHandler {
    fn process(&self, job: &ProcessJob) -> Result<Vec<StepResult>> {
        if !job.source.is_file() {
            anyhow::bail!("source {:?} vanished before processing", job.source);
        }

        let mut results = Vec::new();
        if job.options.generate_thumbnails {
            results.push(StepResult::skipped(
                "generate_thumbnails",
                "no codec for documents",
            ));
        }
        if job.options.create_web_versions {
            results.push(StepResult::skipped(
                "create_web_versions",
                "no codec for documents",
            ));
        }
        if job.options.extract_metadata {
            results.push(run_step("extract_metadata", || {
                let meta = std::fs::metadata(&job.source)?;
                let mut result = StepResult::success("extract_metadata");
                result.details.insert("size".to_string(), json!(meta.len()));
                result
                    .details
                    .insert("mime".to_string(), json!(mime_for_extension(&job.source)));
                Ok(result)
            }));
        }
        if job.options.quality_analysis {
            results.push(StepResult::skipped(
                "quality_analysis",
                "not supported for documents",
            ));
        }
        if job.options.optimize_original {
            results.push(StepResult::skipped(
                "optimize_original",
                "no codec for documents",
            ));
        }
        Ok(results)
    }
}
