//! Per-step outcome records produced by the type handlers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Skipped,
    Failed,
}

/// One produced derivative: a thumbnail rendition, web version, etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub label: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Artifact {
    pub fn new(label: &str, path: PathBuf) -> Self {
        Self {
            label: label.to_string(),
            path,
            width: None,
            height: None,
            size: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Outcome of one pipeline step. A failed step carries its error detail
/// here instead of aborting its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    /// Step-specific measurements (size_reduction, width/height, exif, …).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl StepResult {
    pub fn success(step: &str) -> Self {
        Self {
            step: step.to_string(),
            outcome: StepOutcome::Success,
            artifacts: Vec::new(),
            details: Map::new(),
            error_detail: None,
        }
    }

    pub fn skipped(step: &str, reason: &str) -> Self {
        let mut result = Self::success(step);
        result.outcome = StepOutcome::Skipped;
        result
            .details
            .insert("reason".to_string(), Value::String(reason.to_string()));
        result
    }

    pub fn failed(step: &str, err: &anyhow::Error) -> Self {
        let mut result = Self::success(step);
        result.outcome = StepOutcome::Failed;
        result.error_detail = Some(format!("{err:#}"));
        result
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}
