//! Blob storage seam.
//!
//! The pipeline only needs existence/size/read/write; the backing medium
//! is the embedding service's concern. A plain local-filesystem
//! implementation is provided for the common deployment and for tests.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub trait Storage: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn size(&self, path: &Path) -> Result<u64>;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Blobs live directly on the local filesystem at their recorded paths.
#[derive(Debug, Default)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn size(&self, path: &Path) -> Result<u64> {
        let meta = fs::metadata(path)
            .context(format!("failed to stat blob {:?}", path))?;
        Ok(meta.len())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).context(format!("failed to read blob {:?}", path))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("failed to create directory tree {:?}", parent))?;
        }
        fs::write(path, bytes).context(format!("failed to write blob {:?}", path))
    }
}
