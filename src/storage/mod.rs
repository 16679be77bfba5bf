//! Persistence layer.
//!
//! Run history, valuation snapshots and the supplement file are plain
//! JSON documents under the configured data directory. Every write goes
//! through [`write_atomic`], so readers either see the previous document
//! or the complete new one.

pub mod history;
pub mod snapshot;
pub mod supplement;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::{RunHistory, ValuationRecord};

pub use history::JsonHistoryLedger;
pub use snapshot::JsonSnapshotSink;
pub use supplement::load_supplement;

/// Reads and advances the last-successful-run entry.
pub trait RunHistoryLedger: Send + Sync {
    /// `None` when no run has completed yet.
    fn read(&self) -> Result<Option<RunHistory>>;

    fn write(&self, project_name: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Persists a finished valuation record.
pub trait SnapshotSink: Send + Sync {
    /// Write the whole record or nothing. Returns where it landed.
    fn write(&self, record: &ValuationRecord) -> Result<PathBuf>;
}

/// Write `contents` to a temp file next to `path`, then rename over it.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic_with_mode(path, contents, None)
}

/// [`write_atomic`] for files only the owner may read (mode 0600 on unix).
pub fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic_with_mode(path, contents, Some(0o600))
}

fn write_atomic_with_mode(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file path {}", path.display()))?;
    let tmp = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    if let Err(e) = write_synced(&tmp, contents, mode) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to move temp file into {}", path.display()));
    }

    Ok(())
}

/// Create `path` with its final permissions, write and flush it to disk.
fn write_synced(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create temp file {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write temp file {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {}", path.display()))?;
    Ok(())
}
