//! Cooldown gate.
//!
//! Pure decision function over the run history, the configured project and
//! the current time. Writing history after a successful run is the caller's
//! job.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use crate::config::ProjectConfig;
use crate::types::{GateDenial, RunHistory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(GateDenial),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    /// `Ok(())` when allowed, the denial otherwise.
    pub fn into_result(self) -> Result<(), GateDenial> {
        match self {
            GateDecision::Allow => Ok(()),
            GateDecision::Deny(denial) => Err(denial),
        }
    }
}

/// Decide whether a run for `project` may start at `now`.
///
/// A history without a timestamp (never run) always allows, provided it
/// belongs to the same project.
pub fn check_gate(history: &RunHistory, project: &ProjectConfig, now: DateTime<Utc>) -> GateDecision {
    if history.project_name != project.name {
        return GateDecision::Deny(GateDenial::ProjectMismatch {
            history: history.project_name.clone(),
            configured: project.name.clone(),
        });
    }

    let Some(last_run) = history.last_run else {
        debug!(project = %project.name, "No previous run, gate open");
        return GateDecision::Allow;
    };

    let remaining = match remaining_cooldown(last_run, project.cooldown, now) {
        Some(remaining) => remaining,
        None => {
            debug!(project = %project.name, last_run = %last_run, "Cooldown elapsed, gate open");
            return GateDecision::Allow;
        }
    };

    GateDecision::Deny(GateDenial::CooldownNotElapsed {
        last_run,
        cooldown: project.cooldown,
        remaining,
    })
}

/// Time left until the next run is permitted, or `None` if it already is.
///
/// A `now` before `last_run` (clock moved backwards) extends the wait by
/// the difference.
pub fn remaining_cooldown(
    last_run: DateTime<Utc>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    match (now - last_run).to_std() {
        Ok(elapsed) if elapsed >= cooldown => None,
        Ok(elapsed) => Some(cooldown - elapsed),
        Err(_) => {
            let ahead = (last_run - now).to_std().unwrap_or_default();
            Some(cooldown.saturating_add(ahead))
        }
    }
}
