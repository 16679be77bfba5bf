//! Valuation pipeline.
//!
//! Gate → prechecks → inventory → item set → dispatch → aggregate →
//! snapshot → sink → history. Every stage before the sink write can abort
//! the run; history only moves after the snapshot has landed.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::aggregator::{aggregate, Aggregation, FailureEntry, FailurePolicy};
use super::dispatcher::ValuationDispatcher;
use super::gate::check_gate;
use super::item_set::{build_item_set, FilterPolicy};
use super::median::MedianPriceResolver;
use super::snapshot::build_snapshot;
use crate::config::ProjectConfig;
use crate::report;
use crate::sources::{AccountStatusSource, InventorySource, PriceSource};
use crate::storage::{RunHistoryLedger, SnapshotSink};
use crate::types::{RunHistory, Supplement, ValuationError, ValuationRecord};

/// Source of "now". Swapped out in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Per-run switches.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub filter: FilterPolicy,
    pub failure_policy: FailurePolicy,
    pub skip_services_check: bool,
    pub skip_user_check: bool,
    /// Print the result table to stdout before the failure policy applies.
    pub print_results: bool,
}

/// Remote collaborators.
#[derive(Clone)]
pub struct PipelineSources {
    pub inventory: Arc<dyn InventorySource>,
    pub prices: Arc<dyn PriceSource>,
    /// Required unless both account checks are skipped.
    pub status: Option<Arc<dyn AccountStatusSource>>,
}

/// Local collaborators.
#[derive(Clone)]
pub struct PipelineStorage {
    pub ledger: Arc<dyn RunHistoryLedger>,
    pub sink: Arc<dyn SnapshotSink>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub record: ValuationRecord,
    pub snapshot_path: PathBuf,
    pub failures: Vec<FailureEntry>,
    pub attempted: usize,
}

pub struct ValuationPipeline {
    project: ProjectConfig,
    options: RunOptions,
    supplement: Option<Supplement>,
    sources: PipelineSources,
    storage: PipelineStorage,
    clock: Clock,
}

impl ValuationPipeline {
    pub fn new(
        project: ProjectConfig,
        options: RunOptions,
        supplement: Option<Supplement>,
        sources: PipelineSources,
        storage: PipelineStorage,
    ) -> Self {
        Self {
            project,
            options,
            supplement,
            sources,
            storage,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run history for this project, or a synthetic "never run" entry.
    pub fn current_history(&self) -> Result<RunHistory, ValuationError> {
        let history = self
            .storage
            .ledger
            .read()
            .map_err(|e| ValuationError::History(format!("{e:#}")))?;
        Ok(history.unwrap_or_else(|| RunHistory::never_run(&self.project.name)))
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary, ValuationError> {
        let project = &self.project.name;

        // -- Gate --------------------------------------------------------

        let history = self.current_history()?;
        check_gate(&history, &self.project, (self.clock)()).into_result()?;
        info!(project = %project, history = %history, "Gate open");

        // -- Prechecks ---------------------------------------------------

        self.run_prechecks(cancel).await?;

        // -- Inventory and item set --------------------------------------

        let inventory = with_cancel(cancel, self.sources.inventory.fetch_inventory(self.project.account_id))
            .await?
            .map_err(|e| ValuationError::source_unavailable("inventory source", &e))?;

        let items = build_item_set(&inventory, self.options.filter, self.supplement.as_ref())?;
        if items.is_empty() {
            return Err(ValuationError::EmptyItemSet);
        }

        // -- Dispatch and aggregate --------------------------------------

        let dispatcher =
            ValuationDispatcher::new(MedianPriceResolver::new(Arc::clone(&self.sources.prices)));
        let results = dispatcher.dispatch(&items, cancel).await;

        if cancel.is_cancelled() {
            warn!(project = %project, "Run cancelled, nothing persisted");
            return Err(ValuationError::Cancelled);
        }

        let aggregation = aggregate(&items, &results);
        if self.options.print_results {
            print_report(&aggregation);
        }
        aggregation.enforce(self.options.failure_policy)?;

        // -- Persist -----------------------------------------------------

        let Aggregation {
            lines,
            failures,
            attempted,
        } = aggregation;

        let now = (self.clock)();
        let record = build_snapshot(project, now, lines)?;

        let snapshot_path = self
            .storage
            .sink
            .write(&record)
            .map_err(|e| ValuationError::Persistence(format!("{e:#}")))?;

        self.storage
            .ledger
            .write(project, now)
            .map_err(|e| ValuationError::History(format!("{e:#}")))?;

        info!(
            project = %project,
            lines = record.items.len(),
            copies = record.total_amount(),
            total_value = record.total_value(),
            failed_keys = failures.len(),
            path = %snapshot_path.display(),
            "Run completed"
        );

        Ok(RunSummary {
            record,
            snapshot_path,
            failures,
            attempted,
        })
    }

    async fn run_prechecks(&self, cancel: &CancellationToken) -> Result<(), ValuationError> {
        if self.options.skip_services_check && self.options.skip_user_check {
            debug!("Account checks skipped");
            return Ok(());
        }

        let status = self.sources.status.as_ref().ok_or_else(|| {
            ValuationError::PrecheckFailed("account checks enabled but no status source configured".into())
        })?;

        if !self.options.skip_services_check {
            let services = with_cancel(cancel, status.service_status())
                .await?
                .map_err(|e| ValuationError::source_unavailable("service status", &e))?;
            let offline = services.offline_services();
            if !offline.is_empty() {
                return Err(ValuationError::PrecheckFailed(format!(
                    "required services offline: {} (sessions: {}, community: {})",
                    offline.join(", "),
                    services.sessions_logon,
                    services.community
                )));
            }
            info!(sessions = %services.sessions_logon, community = %services.community, "Services check passed");
        }

        if !self.options.skip_user_check {
            let user = with_cancel(cancel, status.user_summary(self.project.account_id))
                .await?
                .map_err(|e| ValuationError::source_unavailable("user summary", &e))?;
            if let Some(problem) = user.problem() {
                return Err(ValuationError::PrecheckFailed(problem));
            }
            info!(account_id = user.account_id, persona = %user.persona_name, "User check passed");
        }

        Ok(())
    }
}

/// Race a call against the run's cancellation token.
async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, ValuationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ValuationError::Cancelled),
        out = fut => Ok(out),
    }
}

fn print_report(aggregation: &Aggregation) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = report::write_results(&mut out, aggregation) {
        warn!(error = %e, "Failed to print results");
    }
}
