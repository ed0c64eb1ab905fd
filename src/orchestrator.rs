//! Processing orchestrator - verifies access, drives the status machine,
//! dispatches to the type handlers on the blocking pool, bounds wall-clock
//! time and attempts, and fans completion out to the aggregator and sinks.

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use chrono::Utc;
use log::{error, warn};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::aggregate;
use crate::common::PIPELINE_RUNTIME;
use crate::common::errors::{PipelineError, handle_error};
use crate::config::{PipelineConfig, ProcessingOptions};
use crate::models::{AssetRecord, AssetStatus, StepResult};
use crate::notify::{LogSink, NoopOwnerUpdater, NotificationSink, OwnerUpdater};
use crate::processors::{HandlerSet, ProcessJob};
use crate::storage::{LocalStorage, Storage};

pub struct ProcessingOrchestrator {
    storage: Arc<dyn Storage>,
    handlers: Arc<HandlerSet>,
    sink: Arc<dyn NotificationSink>,
    owner_updater: Arc<dyn OwnerUpdater>,
    config: PipelineConfig,
}

impl ProcessingOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            storage: Arc::new(LocalStorage),
            handlers: Arc::new(HandlerSet::default()),
            sink: Arc::new(LogSink),
            owner_updater: Arc::new(NoopOwnerUpdater),
            config,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerSet) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_owner_updater(mut self, owner_updater: Arc<dyn OwnerUpdater>) -> Self {
        self.owner_updater = owner_updater;
        self
    }

    /// The source blob must be present and non-empty before any status
    /// mutation happens; on failure the asset stays `uploaded`.
    pub fn verify_access(&self, asset: &AssetRecord) -> Result<u64, PipelineError> {
        if !self.storage.exists(&asset.file_path) {
            return Err(PipelineError::Access {
                path: asset.file_path.clone(),
            });
        }
        match self.storage.size(&asset.file_path) {
            Ok(0) | Err(_) => Err(PipelineError::Access {
                path: asset.file_path.clone(),
            }),
            Ok(size) => Ok(size),
        }
    }

    /// Run the derivative pipeline for one asset. After this returns the
    /// asset's status is terminal — never left at `processing`.
    pub async fn run(
        &self,
        asset: &mut AssetRecord,
        options: &ProcessingOptions,
    ) -> Result<AssetStatus, PipelineError> {
        let original_size = self.verify_access(asset)?;
        asset.status = AssetStatus::Processing;

        let job = ProcessJob {
            source: asset.file_path.clone(),
            derivative_dir: self.config.derivative_root.join(asset.id.to_string()),
            original_size,
            options: options.clone(),
            config: self.config.clone(),
        };
        let file_type = asset.file_type;

        // One wall-clock budget across all attempts.
        let deadline = Instant::now() + self.config.budget;
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let handlers = self.handlers.clone();
            let job = job.clone();
            let work = tokio::task::spawn_blocking(move || {
                handlers.handler_for(file_type).process(&job)
            });

            match tokio::time::timeout(remaining, work).await {
                Err(_elapsed) => {
                    // The blocking task cannot be interrupted; it finishes on
                    // the pool while the record is already failed.
                    let budget = self.config.budget;
                    self.mark_failed(
                        asset,
                        &format!("processing exceeded the {:?} wall-clock budget", budget),
                    );
                    return Err(PipelineError::Timeout { budget });
                }
                Ok(Err(join_err)) => {
                    last_error = Some(anyhow!(join_err).context("handler task aborted"));
                }
                Ok(Ok(Err(handler_err))) => {
                    warn!(
                        "attempt {}/{} failed for asset {}: {:#}",
                        attempt, max_attempts, asset.id, handler_err
                    );
                    last_error = Some(handler_err);
                }
                Ok(Ok(Ok(results))) => return Ok(self.complete(asset, &results)),
            }
        }

        let err = handle_error(
            last_error.unwrap_or_else(|| anyhow!("processing budget exhausted")),
        );
        self.mark_failed(asset, &format!("{err:#}"));
        Err(PipelineError::Invocation(err))
    }

    /// Fire-and-forget entry point for upload time: runs on the dedicated
    /// pipeline runtime and hands the mutated record back via the handle.
    pub fn spawn(
        self: &Arc<Self>,
        mut asset: AssetRecord,
        options: ProcessingOptions,
    ) -> JoinHandle<AssetRecord> {
        let this = Arc::clone(self);
        PIPELINE_RUNTIME.spawn(async move {
            if let Err(err) = this.run(&mut asset, &options).await {
                error!("asset {} processing failed: {err}", asset.id);
            }
            asset
        })
    }

    fn complete(&self, asset: &mut AssetRecord, results: &[StepResult]) -> AssetStatus {
        let now = Utc::now();
        aggregate::merge_into(&mut asset.metadata, results, now);
        // A run that produced no medium rendition keeps the prior thumbnail.
        if let Some(path) = aggregate::thumbnail_path(results) {
            asset.thumbnail_path = Some(path);
        }
        asset.processed_at = Some(now);
        asset.status = aggregate::terminal_status(results);

        let summary = aggregate::improvements(results);
        let payload = json!({
            "asset_id": asset.id,
            "owner_id": asset.owner_id,
            "status": asset.status,
            "improvements": summary,
        });
        if let Err(err) = self.sink.emit("asset.processed", &payload) {
            warn!(
                "completion notification failed for asset {}: {:#}",
                asset.id, err
            );
        }
        if let Err(err) = self.owner_updater.record_completion(asset.owner_id, now) {
            warn!("owner record update failed for {}: {:#}", asset.owner_id, err);
        }
        asset.status
    }

    fn mark_failed(&self, asset: &mut AssetRecord, detail: &str) {
        asset
            .metadata
            .insert("processing_error".to_string(), json!(detail));
        asset
            .metadata
            .insert("failed_at".to_string(), json!(Utc::now().to_rfc3339()));
        asset.status = AssetStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;

    use anyhow::{Result, bail};
    use uuid::Uuid;

    use super::*;
    use crate::media::{Dimensions, MediaProbe};

    /// Storage that reports a blob the filesystem does not actually have,
    /// forcing a handler-level failure mid-run.
    struct LyingStorage;

    impl Storage for LyingStorage {
        fn exists(&self, _path: &Path) -> bool {
            true
        }
        fn size(&self, _path: &Path) -> Result<u64> {
            Ok(5)
        }
        fn read(&self, _path: &Path) -> Result<Vec<u8>> {
            bail!("no such blob")
        }
        fn write(&self, _path: &Path, _bytes: &[u8]) -> Result<()> {
            bail!("read-only")
        }
    }

    /// Probe whose resize outlives any sane budget.
    struct SlowProbe;

    impl MediaProbe for SlowProbe {
        fn resize(&self, _src: &Path, _dst: &Path, _w: u32, _h: u32) -> Result<bool> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(true)
        }
        fn reencode(&self, _src: &Path, _dst: &Path, _quality: u8) -> Result<bool> {
            Ok(false)
        }
        fn read_dimensions(&self, _path: &Path) -> Option<Dimensions> {
            None
        }
        fn read_exif(&self, _path: &Path) -> Option<BTreeMap<String, String>> {
            None
        }
    }

    fn asset_at(path: &Path) -> AssetRecord {
        AssetRecord::new(Uuid::new_v4(), path.to_path_buf())
    }

    #[tokio::test]
    async fn zero_byte_blob_fails_access_before_any_status_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();

        let orchestrator = ProcessingOrchestrator::new(PipelineConfig::default());
        let mut asset = asset_at(&path);
        let result = orchestrator
            .run(&mut asset, &ProcessingOptions::default())
            .await;

        assert!(matches!(result, Err(PipelineError::Access { .. })));
        assert_eq!(asset.status, AssetStatus::Uploaded);
        assert!(asset.metadata.is_empty());
    }

    #[tokio::test]
    async fn handler_failure_marks_the_asset_failed_with_an_error_trail() {
        let dir = tempfile::tempdir().unwrap();
        // The storage seam says this image exists; the handler then finds
        // the source gone and escalates.
        let path = dir.path().join("phantom.jpg");

        let mut config = PipelineConfig::single_pass();
        config.derivative_root = dir.path().join("derived");
        let orchestrator =
            ProcessingOrchestrator::new(config).with_storage(Arc::new(LyingStorage));
        let mut asset = asset_at(&path);

        let result = orchestrator
            .run(&mut asset, &ProcessingOptions::default())
            .await;

        assert!(matches!(result, Err(PipelineError::Invocation(_))));
        assert_eq!(asset.status, AssetStatus::Failed);
        assert!(asset.metadata.contains_key("processing_error"));
        assert!(asset.metadata.contains_key("failed_at"));
    }

    #[tokio::test]
    async fn exhausted_budget_marks_the_asset_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.jpg");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let mut config = PipelineConfig::single_pass();
        config.budget = Duration::from_millis(25);
        config.derivative_root = dir.path().join("derived");

        let orchestrator = ProcessingOrchestrator::new(config).with_handlers(
            crate::processors::HandlerSet::default().with_image_probe(Arc::new(SlowProbe)),
        );
        let mut asset = asset_at(&path);

        let result = orchestrator
            .run(&mut asset, &ProcessingOptions::default())
            .await;

        assert!(matches!(result, Err(PipelineError::Timeout { .. })));
        assert_eq!(asset.status, AssetStatus::Failed);
        assert!(asset.metadata.contains_key("processing_error"));
    }

    #[tokio::test]
    async fn generic_asset_run_merges_metadata_additively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.xyz");
        std::fs::write(&path, b"opaque bytes").unwrap();

        let mut config = PipelineConfig::default();
        config.derivative_root = dir.path().join("derived");
        let orchestrator = ProcessingOrchestrator::new(config);

        let mut asset = asset_at(&path);
        asset
            .metadata
            .insert("foo".to_string(), json!("bar"));

        let status = orchestrator
            .run(&mut asset, &ProcessingOptions::default())
            .await
            .unwrap();

        assert_eq!(status, AssetStatus::Processed);
        assert_eq!(asset.metadata.get("foo"), Some(&json!("bar")));
        assert!(asset.metadata.contains_key("optimization_results"));
        assert!(asset.processed_at.is_some());
        // Generic runs never produce a medium rendition.
        assert!(asset.thumbnail_path.is_none());
    }
}
