//! Backup-attempt-commit/revert wrapper for destructive in-place rewrites.
//!
//! Any step that rewrites the canonical source file goes through
//! [`SafeMutationGuard`]: a sibling backup is taken first, the mutation
//! runs, its outcome is measured against a caller-supplied threshold, and
//! the backup is either dropped (commit) or renamed back over the mutated
//! file (revert). The rename restore is atomic on the filesystems we care
//! about, so there is no window where neither version is fully present.
//! On every path out of [`SafeMutationGuard::attempt`] — commit, revert,
//! mutator error, even a panic unwinding through it — the backup file is
//! gone and the caller either has the mutated file or the original bytes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};

/// What `attempt` did with the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The threshold was met; the mutated file is the new canonical file.
    Committed,
    /// The threshold was not met; the original bytes were restored.
    Reverted,
}

pub struct SafeMutationGuard {
    source: PathBuf,
    backup: PathBuf,
    original_size: u64,
}

impl SafeMutationGuard {
    /// Copy the source to a sibling backup before any mutation runs.
    pub fn snapshot(source: &Path) -> Result<Self> {
        let backup = backup_path(source);
        let original_size = fs::metadata(source)
            .context(format!("failed to stat {:?} before mutation", source))?
            .len();
        fs::copy(source, &backup)
            .context(format!("failed to back up {:?} to {:?}", source, backup))?;
        Ok(Self {
            source: source.to_path_buf(),
            backup,
            original_size,
        })
    }

    /// Run `mutator` against the source path, then keep the result only if
    /// `threshold(original_size, mutated_size)` holds. A mutator error
    /// restores the original bytes and re-raises.
    pub fn attempt<M, T>(mut self, mutator: M, threshold: T) -> Result<MutationOutcome>
    where
        M: FnOnce(&Path) -> Result<()>,
        T: FnOnce(u64, u64) -> bool,
    {
        if let Err(err) = mutator(&self.source) {
            self.restore()?;
            return Err(err.context(format!("mutation of {:?} failed, original restored", self.source)));
        }

        let mutated_size = fs::metadata(&self.source)
            .context(format!("failed to stat {:?} after mutation", self.source))?
            .len();

        if threshold(self.original_size, mutated_size) {
            fs::remove_file(&self.backup)
                .context(format!("failed to remove backup {:?}", self.backup))?;
            self.backup.clear();
            Ok(MutationOutcome::Committed)
        } else {
            info!(
                "mutation of {:?} did not clear its threshold ({} -> {} bytes), reverting",
                self.source, self.original_size, mutated_size
            );
            self.restore()?;
            Ok(MutationOutcome::Reverted)
        }
    }

    /// Atomically rename the backup back over the source.
    fn restore(&mut self) -> Result<()> {
        fs::rename(&self.backup, &self.source).context(format!(
            "failed to restore {:?} from backup {:?}",
            self.source, self.backup
        ))?;
        self.backup.clear();
        Ok(())
    }
}

impl Drop for SafeMutationGuard {
    // Safety net for panics unwinding out of the mutator: if neither
    // commit nor revert ran, put the original bytes back.
    fn drop(&mut self) {
        if !self.backup.as_os_str().is_empty() && self.backup.exists() {
            if let Err(err) = fs::rename(&self.backup, &self.source) {
                error!(
                    "failed to restore {:?} from backup {:?} during unwind: {}",
                    self.source, self.backup, err
                );
            }
        }
    }
}

fn backup_path(source: &Path) -> PathBuf {
    let mut name = source.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    source.with_file_name(name)
}
