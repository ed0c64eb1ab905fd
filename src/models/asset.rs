//! Asset record and its status/type vocabulary.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::common::{
    VALID_DOCUMENT_EXTENSIONS, VALID_IMAGE_EXTENSIONS, VALID_VIDEO_EXTENSIONS,
};

/// Closed set of asset kinds. Dispatch into the type handlers keys off
/// this enum; anything unrecognized lands on `Generic`, so adding a new
/// kind is a new variant, not a new string branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Image,
    Video,
    Document,
    Generic,
}

impl FileType {
    /// Classify by file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some(ext) if VALID_IMAGE_EXTENSIONS.contains(&ext) => Self::Image,
            Some(ext) if VALID_VIDEO_EXTENSIONS.contains(&ext) => Self::Video,
            Some(ext) if VALID_DOCUMENT_EXTENSIONS.contains(&ext) => Self::Document,
            _ => Self::Generic,
        }
    }
}

/// Per-invocation state machine:
/// `uploaded → processing → {processed | completed_with_errors | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Uploaded,
    Processing,
    Processed,
    CompletedWithErrors,
    Failed,
}

impl AssetStatus {
    /// A status the pipeline does not leave without an external re-invocation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Processed | Self::CompletedWithErrors | Self::Failed
        )
    }

    /// Whether a host retry loop may re-enter processing from this status.
    /// `Processed` requires an explicit external re-trigger instead.
    pub fn is_reprocessable(self) -> bool {
        matches!(
            self,
            Self::Uploaded | Self::Failed | Self::CompletedWithErrors
        )
    }
}

/// One uploaded file attached to a proof record. Created by the upload
/// handler in status `uploaded`; mutated exclusively by the pipeline while
/// a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: Uuid,
    /// The proof aggregate this asset belongs to.
    pub owner_id: Uuid,
    pub file_path: PathBuf,
    pub file_type: FileType,
    pub status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
    /// Open-ended document, merged additively across runs. Keys written
    /// by other subsystems persist untouched.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl AssetRecord {
    pub fn new(owner_id: Uuid, file_path: PathBuf) -> Self {
        let file_type = FileType::from_path(&file_path);
        Self {
            id: Uuid::new_v4(),
            owner_id,
            file_path,
            file_type,
            status: AssetStatus::Uploaded,
            thumbnail_path: None,
            metadata: Map::new(),
            processed_at: None,
        }
    }
}
