//! Explicit configuration records passed into the orchestrator.
//!
//! Nothing in the pipeline reads ambient clocks or toggles; every run is
//! parameterized by an immutable [`ProcessingOptions`] + [`PipelineConfig`]
//! pair supplied by the caller.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{MIN_OPTIMIZE_REDUCTION, OPTIMIZE_QUALITY, WEB_VERSION_QUALITY};

/// Per-run step toggles. Destructive optimization and quality analysis
/// are opt-in; everything else is on by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessingOptions {
    pub generate_thumbnails: bool,
    pub create_web_versions: bool,
    pub extract_metadata: bool,
    pub optimize_original: bool,
    pub quality_analysis: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            generate_thumbnails: true,
            create_web_versions: true,
            extract_metadata: true,
            optimize_original: false,
            quality_analysis: false,
        }
    }
}

/// Resource bounds and codec parameters for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Wall-clock budget for one full invocation.
    pub budget: Duration,
    /// Invocation-level attempts before the asset is marked failed.
    pub max_attempts: u32,
    /// Root directory under which per-asset derivative folders are created.
    pub derivative_root: PathBuf,
    pub web_quality: u8,
    pub optimize_quality: u8,
    /// Fractional size reduction a destructive optimize must clear to commit.
    pub min_optimize_reduction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(600),
            max_attempts: 2,
            derivative_root: PathBuf::from("./object/derived"),
            web_quality: WEB_VERSION_QUALITY,
            optimize_quality: OPTIMIZE_QUALITY,
            min_optimize_reduction: MIN_OPTIMIZE_REDUCTION,
        }
    }
}

impl PipelineConfig {
    /// Lighter single-pass variant: half the budget, no retry.
    pub fn single_pass() -> Self {
        Self {
            budget: Duration::from_secs(300),
            max_attempts: 1,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_matches_contract() {
        let options = ProcessingOptions::default();
        assert!(options.generate_thumbnails);
        assert!(options.create_web_versions);
        assert!(options.extract_metadata);
        assert!(!options.optimize_original);
        assert!(!options.quality_analysis);
    }

    #[test]
    fn options_deserialize_fills_defaults() {
        let options: ProcessingOptions =
            serde_json::from_str(r#"{"optimizeOriginal": true}"#).unwrap();
        assert!(options.optimize_original);
        assert!(options.generate_thumbnails);
    }

    #[test]
    fn single_pass_halves_the_budget() {
        let config = PipelineConfig::single_pass();
        assert_eq!(config.budget, Duration::from_secs(300));
        assert_eq!(config.max_attempts, 1);
    }
}
