//! Completion signaling seams: the notification sink and the owning
//! proof record's counter update. Both are fire-and-forget; failures are
//! logged by the orchestrator and never fail the pipeline.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::Value;
use uuid::Uuid;

pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &str, payload: &Value) -> Result<()>;
}

/// Default sink: writes the event to the log stream.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn emit(&self, event: &str, payload: &Value) -> Result<()> {
        info!("event {}: {}", event, payload);
        Ok(())
    }
}

/// Additive counter/timestamp update on the owning proof record.
/// Last-write-wins; there is no read-modify-write conflict protection.
pub trait OwnerUpdater: Send + Sync {
    fn record_completion(&self, owner_id: Uuid, processed_at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NoopOwnerUpdater;

impl OwnerUpdater for NoopOwnerUpdater {
    fn record_completion(&self, owner_id: Uuid, processed_at: DateTime<Utc>) -> Result<()> {
        debug!("owner {} asset processed at {}", owner_id, processed_at);
        Ok(())
    }
}
