//! Result aggregation - pure functions from step results to persisted
//! metadata, derived fields and the notification payload. No side effects
//! of their own; the orchestrator applies the outputs to the record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::common::OPTIMIZATION_VERSION;
use crate::models::{AssetStatus, StepOutcome, StepResult};

/// Any step-level failure anywhere demotes the run to
/// `completed_with_errors`; skips do not.
pub fn terminal_status(results: &[StepResult]) -> AssetStatus {
    if results
        .iter()
        .any(|result| result.outcome == StepOutcome::Failed)
    {
        AssetStatus::CompletedWithErrors
    } else {
        AssetStatus::Processed
    }
}

/// The medium rendition backs the record's thumbnail. `None` means the
/// caller keeps whatever thumbnail path the record already had.
pub fn thumbnail_path(results: &[StepResult]) -> Option<PathBuf> {
    results
        .iter()
        .flat_map(|result| result.artifacts.iter())
        .find(|artifact| artifact.label == "medium")
        .map(|artifact| artifact.path.clone())
}

/// Union the current run's outcome into the existing metadata document.
/// Unrelated keys written by other subsystems persist untouched.
pub fn merge_into(
    metadata: &mut Map<String, Value>,
    results: &[StepResult],
    now: DateTime<Utc>,
) {
    metadata.insert(
        "optimization_results".to_string(),
        serde_json::to_value(results).unwrap_or(Value::Null),
    );
    metadata.insert("optimized_at".to_string(), json!(now.to_rfc3339()));
    metadata.insert(
        "optimization_version".to_string(),
        json!(OPTIMIZATION_VERSION),
    );
}

/// Compact summary for the completion notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSummary {
    pub thumbnails: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_reduction: Option<f64>,
    pub web_version: bool,
}

pub fn improvements(results: &[StepResult]) -> ImprovementSummary {
    let thumbnails = results
        .iter()
        .filter(|result| result.step == "generate_thumbnails")
        .map(|result| result.artifacts.len())
        .sum();

    let web = results
        .iter()
        .find(|result| result.step == "create_web_versions");
    let web_version = web.is_some_and(|result| !result.artifacts.is_empty());
    let size_reduction = web
        .and_then(|result| result.details.get("size_reduction"))
        .and_then(Value::as_f64);

    ImprovementSummary {
        thumbnails,
        size_reduction,
        web_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artifact;

    fn thumbs_result() -> StepResult {
        StepResult::success("generate_thumbnails")
            .with_artifact(Artifact::new("small", "d/thumb_small.jpg".into()))
            .with_artifact(Artifact::new("medium", "d/thumb_medium.jpg".into()))
            .with_artifact(Artifact::new("large", "d/thumb_large.jpg".into()))
    }

    #[test]
    fn merge_preserves_unrelated_keys() {
        let mut metadata = Map::new();
        metadata.insert("foo".to_string(), json!("bar"));

        merge_into(&mut metadata, &[thumbs_result()], Utc::now());

        assert_eq!(metadata.get("foo"), Some(&json!("bar")));
        assert!(metadata.contains_key("optimization_results"));
        assert_eq!(
            metadata.get("optimization_version"),
            Some(&json!(OPTIMIZATION_VERSION))
        );
    }

    #[test]
    fn thumbnail_path_comes_from_the_medium_artifact() {
        let results = vec![thumbs_result()];
        assert_eq!(
            thumbnail_path(&results),
            Some(PathBuf::from("d/thumb_medium.jpg"))
        );

        let no_medium = vec![StepResult::success("generate_thumbnails")
            .with_artifact(Artifact::new("small", "d/thumb_small.jpg".into()))];
        assert_eq!(thumbnail_path(&no_medium), None);
    }

    #[test]
    fn any_failed_step_demotes_the_run() {
        let err = anyhow::anyhow!("boom");
        let results = vec![thumbs_result(), StepResult::failed("create_web_versions", &err)];
        assert_eq!(terminal_status(&results), AssetStatus::CompletedWithErrors);

        let clean = vec![thumbs_result(), StepResult::skipped("optimize_original", "opt-in")];
        assert_eq!(terminal_status(&clean), AssetStatus::Processed);
    }

    #[test]
    fn improvements_summarize_the_run() {
        let results = vec![
            thumbs_result(),
            StepResult::success("create_web_versions")
                .with_artifact(Artifact::new("web", "d/web.jpg".into()))
                .with_detail("size_reduction", json!(0.42)),
        ];

        let summary = improvements(&results);
        assert_eq!(summary.thumbnails, 3);
        assert!(summary.web_version);
        assert_eq!(summary.size_reduction, Some(0.42));
    }
}
