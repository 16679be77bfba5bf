//! Last-run ledger backed by a single JSON file.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{write_atomic, RunHistoryLedger};
use crate::types::RunHistory;

pub struct JsonHistoryLedger {
    path: PathBuf,
}

impl JsonHistoryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/lastrun/lastrun.json`
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("lastrun").join("lastrun.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn validate(entry: &RunHistory) -> Result<()> {
    if entry.project_name.is_empty() {
        bail!("project name cannot be empty");
    }
    if entry.last_run.is_none() {
        bail!("last run time is missing");
    }
    Ok(())
}

impl RunHistoryLedger for JsonHistoryLedger {
    fn read(&self) -> Result<Option<RunHistory>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No run history found");
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read run history from {}", self.path.display()))?;
        let entry: RunHistory = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse run history from {}", self.path.display()))?;
        validate(&entry).context("Invalid run history entry")?;

        debug!(history = %entry, "Run history loaded");
        Ok(Some(entry))
    }

    fn write(&self, project_name: &str, at: DateTime<Utc>) -> Result<()> {
        let entry = RunHistory::new(project_name, at);
        validate(&entry).context("Refusing to write invalid run history")?;

        let json = serde_json::to_vec_pretty(&entry).context("Failed to serialise run history")?;
        write_atomic(&self.path, &json)?;

        debug!(history = %entry, "Run history written");
        Ok(())
    }
}
