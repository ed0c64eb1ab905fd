//! Error taxonomy at the host boundary.
//!
//! Only three conditions escape the pipeline: the source blob was
//! unreadable before anything started, the wall-clock budget ran out, or
//! the dispatched handler itself failed. Step-level failures and rejected
//! mutations are recovered internally and never surface here.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source blob is missing or reports zero length. Raised before any
    /// status mutation, so the asset stays `uploaded`.
    #[error("source blob missing or empty: {path:?}")]
    Access { path: PathBuf },

    /// The invocation exceeded its wall-clock budget and was cancelled.
    #[error("processing exceeded the {budget:?} wall-clock budget")]
    Timeout { budget: Duration },

    /// Handler-level failure (e.g. the source became unreadable mid-run),
    /// re-raised to the host's bounded-retry mechanism.
    #[error(transparent)]
    Invocation(#[from] anyhow::Error),
}

/// Log an error chain and hand it back, for call sites that both record
/// and propagate.
pub fn handle_error(err: anyhow::Error) -> anyhow::Error {
    log::error!("{err:?}");
    err
}
