//! Generic handler - file-stat fallback for unrecognized asset kinds.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::media::mime_for_extension;
use crate::models::StepResult;
use crate::processors::{ProcessJob, TypeHandler, run_step};

#[derive(Debug, Default)]
pub struct GenericHandler;

impl TypeHandler for GenericHandler {
    fn process(&self, job: &ProcessJob) -> Result<Vec<StepResult>> {
        let result = run_step("extract_metadata", || {
            let meta = std::fs::metadata(&job.source)
                .context(format!("failed to stat {:?}", job.source))?;

            let mut result = StepResult::success("extract_metadata");
            result.details.insert("size".to_string(), json!(meta.len()));
            result
                .details
                .insert("mime".to_string(), json!(mime_for_extension(&job.source)));
            if let Ok(modified) = meta.modified() {
                let modified: DateTime<Utc> = modified.into();
                result
                    .details
                    .insert("modified".to_string(), json!(modified.to_rfc3339()));
            }
            Ok(result)
        });
        Ok(vec![result])
    }
}
