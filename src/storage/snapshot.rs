//! Snapshot sink: one JSON file per run under `storages/<project>/`.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{write_atomic, SnapshotSink};
use crate::types::ValuationRecord;

const FILE_PREFIX: &str = "storage_";
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub struct JsonSnapshotSink {
    root: PathBuf,
}

impl JsonSnapshotSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data_dir>/storages`
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("storages"))
    }

    fn project_dir(&self, project_name: &str) -> PathBuf {
        self.root.join(project_name)
    }

    /// File path a record will be written to.
    pub fn path_for(&self, record: &ValuationRecord) -> PathBuf {
        self.project_dir(&record.project_name).join(format!(
            "{FILE_PREFIX}{}.json",
            record.timestamp.format(FILE_TIMESTAMP_FORMAT)
        ))
    }

    /// Most recent snapshot for a project, if any.
    pub fn load_latest(&self, project_name: &str) -> Result<Option<ValuationRecord>> {
        let dir = self.project_dir(project_name);
        if !dir.exists() {
            return Ok(None);
        }

        // The timestamp format sorts lexicographically.
        let mut latest: Option<PathBuf> = None;
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list snapshots in {}", dir.display()))?
        {
            let path = entry?.path();
            let is_snapshot = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
            if is_snapshot && latest.as_ref().map_or(true, |l| path > *l) {
                latest = Some(path);
            }
        }

        let Some(path) = latest else {
            return Ok(None);
        };
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let record = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        Ok(Some(record))
    }
}

impl SnapshotSink for JsonSnapshotSink {
    fn write(&self, record: &ValuationRecord) -> Result<PathBuf> {
        if record.project_name.is_empty() {
            bail!("project name cannot be empty");
        }
        if record.items.is_empty() {
            bail!("no items to write");
        }

        let path = self.path_for(record);
        let json = serde_json::to_vec_pretty(record).context("Failed to serialise snapshot")?;
        write_atomic(&path, &json)?;

        debug!(path = %path.display(), bytes = json.len(), "Snapshot bytes written");
        info!(
            path = %path.display(),
            items = record.items.len(),
            total_value = record.total_value(),
            "Snapshot saved"
        );
        Ok(path)
    }
}
