//! Supplementary item file: `{"items": {"<market hash name>": <quantity>}}`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::types::Supplement;

/// Parse the supplement file. An empty item map is returned as-is; the
/// item set builder decides whether that is an error.
pub fn load_supplement(path: &Path) -> Result<Supplement> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open supplement file {}", path.display()))?;
    let supplement: Supplement = serde_json::from_str(&json)
        .with_context(|| format!("Failed to decode supplement file {}", path.display()))?;

    debug!(path = %path.display(), items = supplement.len(), "Supplement loaded");
    Ok(supplement)
}
