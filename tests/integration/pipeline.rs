//! End-to-end pipeline runs against mock sources and real JSON storage in
//! a temp directory.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use inventory_valuer::config::ProjectConfig;
use inventory_valuer::engine::{
    FailurePolicy, FilterPolicy, PipelineSources, PipelineStorage, RunOptions, ValuationPipeline,
};
use inventory_valuer::sources::AccountStatusSource;
use inventory_valuer::storage::{JsonHistoryLedger, JsonSnapshotSink, RunHistoryLedger, SnapshotSink};
use inventory_valuer::types::{
    GateDenial, Listing, ListingState, RunHistory, Supplement, ValuationError,
};

use crate::mock_sources::{item, listed, FailingSink, MockInventory, MockPrices, MockStatus, ACCOUNT_ID};

const PROJECT: &str = "mainacct";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

/// Shared, movable test clock.
#[derive(Clone)]
struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    fn at(t: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(t)))
    }

    fn advance(&self, by: ChronoDuration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }

    fn as_clock(&self) -> inventory_valuer::engine::Clock {
        let inner = Arc::clone(&self.0);
        Arc::new(move || *inner.lock().unwrap())
    }
}

struct Harness {
    dir: TempDir,
    inventory: Arc<MockInventory>,
    prices: Arc<MockPrices>,
    status: Option<Arc<MockStatus>>,
    options: RunOptions,
    supplement: Option<Supplement>,
    sink: Option<Arc<dyn SnapshotSink>>,
    clock: TestClock,
}

impl Harness {
    fn new(inventory: MockInventory, prices: MockPrices) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            inventory: Arc::new(inventory),
            prices: Arc::new(prices),
            status: None,
            options: RunOptions {
                filter: FilterPolicy::MarketableAndTradable,
                failure_policy: FailurePolicy::Tolerant,
                skip_services_check: true,
                skip_user_check: true,
                print_results: false,
            },
            supplement: None,
            sink: None,
            clock: TestClock::at(t0()),
        }
    }

    fn ledger(&self) -> JsonHistoryLedger {
        JsonHistoryLedger::in_data_dir(self.dir.path())
    }

    fn snapshots(&self) -> JsonSnapshotSink {
        JsonSnapshotSink::in_data_dir(self.dir.path())
    }

    fn snapshot_count(&self) -> usize {
        let dir = self.dir.path().join("storages").join(PROJECT);
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    fn pipeline(&self) -> ValuationPipeline {
        let status = self
            .status
            .as_ref()
            .map(|s| Arc::clone(s) as Arc<dyn AccountStatusSource>);
        let sink = self
            .sink
            .clone()
            .unwrap_or_else(|| Arc::new(self.snapshots()) as Arc<dyn SnapshotSink>);

        ValuationPipeline::new(
            ProjectConfig {
                name: PROJECT.to_string(),
                cooldown: Duration::from_secs(3600),
                account_id: ACCOUNT_ID,
            },
            self.options,
            self.supplement.clone(),
            PipelineSources {
                inventory: Arc::clone(&self.inventory) as _,
                prices: Arc::clone(&self.prices) as _,
                status,
            },
            PipelineStorage {
                ledger: Arc::new(self.ledger()),
                sink,
            },
        )
        .with_clock(self.clock.as_clock())
    }

    async fn run(&self) -> Result<inventory_valuer::engine::RunSummary, ValuationError> {
        self.pipeline().run(&CancellationToken::new()).await
    }
}

fn standard_inventory() -> MockInventory {
    MockInventory::new(vec![
        item("Operation Breakout Weapon Case", true, true),
        item("Operation Breakout Weapon Case", true, true),
        item("M4A1-S | Guardian (Minimal Wear)", true, true),
        item("Glock-18 | Water Elemental (Field-Tested)", true, false),
        item("5 Year Veteran Coin", false, false),
    ])
}

fn standard_prices() -> MockPrices {
    MockPrices::new()
        .with_listings("Operation Breakout Weapon Case", listed(&[500, 520, 480]))
        .with_price("M4A1-S | Guardian (Minimal Wear)", 1250)
        .with_price("Glock-18 | Water Elemental (Field-Tested)", 900)
}

// -- Successful runs --

#[tokio::test]
async fn test_full_run_persists_snapshot_and_history() {
    let h = Harness::new(standard_inventory(), standard_prices());
    let summary = h.run().await.unwrap();

    assert_eq!(summary.attempted, 3);
    assert!(summary.failures.is_empty());
    assert_eq!(summary.record.items.len(), 2);

    let case = &summary.record.items[0];
    assert_eq!(case.market_hash_name, "Operation Breakout Weapon Case");
    assert_eq!(case.amount, 2);
    assert_eq!(case.price, 500);
    assert_eq!(case.currency, "USD");
    assert_eq!(case.metadata.name_color, "D2D2D2");
    assert_eq!(summary.record.total_value(), 2250);

    assert!(summary.snapshot_path.exists());
    let stored = h.snapshots().load_latest(PROJECT).unwrap().unwrap();
    assert_eq!(stored, summary.record);

    assert_eq!(h.ledger().read().unwrap(), Some(RunHistory::new(PROJECT, t0())));
    assert_eq!(h.prices.calls(), 3);
}

#[tokio::test]
async fn test_marketable_only_includes_untradable() {
    let mut h = Harness::new(standard_inventory(), standard_prices());
    h.options.filter = FilterPolicy::MarketableOnly;

    let summary = h.run().await.unwrap();
    assert_eq!(summary.attempted, 4);
    assert!(summary
        .record
        .items
        .iter()
        .any(|l| l.market_hash_name == "Glock-18 | Water Elemental (Field-Tested)" && !l.tradable));
}

#[tokio::test]
async fn test_supplement_entries_priced_with_empty_metadata() {
    let mut h = Harness::new(
        standard_inventory(),
        standard_prices().with_price("Sticker | Katowice 2014", 15000),
    );
    h.supplement = Some(Supplement {
        items: [
            ("Sticker | Katowice 2014".to_string(), 3),
            ("Operation Breakout Weapon Case".to_string(), 1),
        ]
        .into_iter()
        .collect(),
    });

    let summary = h.run().await.unwrap();
    assert_eq!(summary.attempted, 5);

    let case = summary
        .record
        .items
        .iter()
        .find(|l| l.market_hash_name == "Operation Breakout Weapon Case")
        .unwrap();
    assert_eq!(case.amount, 3);
    // Metadata comes from the first (inventory) entry.
    assert_eq!(case.metadata.name, "Operation Breakout Weapon Case");

    let sticker = summary
        .record
        .items
        .iter()
        .find(|l| l.market_hash_name == "Sticker | Katowice 2014")
        .unwrap();
    // One resolution per declared key; the declared quantity is not multiplied in.
    assert_eq!(sticker.amount, 1);
    assert!(sticker.metadata.name.is_empty());
}

#[tokio::test]
async fn test_second_run_after_cooldown() {
    let h = Harness::new(standard_inventory(), standard_prices());
    h.run().await.unwrap();

    h.clock.advance(ChronoDuration::minutes(90));
    h.run().await.unwrap();

    assert_eq!(h.snapshot_count(), 2);
    assert_eq!(
        h.ledger().read().unwrap(),
        Some(RunHistory::new(PROJECT, t0() + ChronoDuration::minutes(90)))
    );
}

// -- Partial and total failure --

#[tokio::test]
async fn test_partial_failure_tolerated() {
    let prices = MockPrices::new()
        .with_price("Operation Breakout Weapon Case", 500)
        .with_listings(
            "M4A1-S | Guardian (Minimal Wear)",
            vec![Listing::new(1250, ListingState::Other)],
        );
    let inventory = MockInventory::new(vec![
        item("Operation Breakout Weapon Case", true, true),
        item("M4A1-S | Guardian (Minimal Wear)", true, true),
        item("AWP | Redline (Field-Tested)", true, true),
        item("Danger Zone Case", true, true),
    ]);
    let prices = prices.with_price("Danger Zone Case", 60);
    let h = Harness::new(inventory, prices);

    let summary = h.run().await.unwrap();
    assert_eq!(summary.record.items.len(), 2);
    assert_eq!(summary.failures.len(), 2);
    assert_eq!(summary.failures[0].market_hash_name, "AWP | Redline (Field-Tested)");
    assert!(summary.failures[1].reason.contains("no active listings"));
    assert_eq!(h.snapshot_count(), 1);
}

#[tokio::test]
async fn test_strict_policy_aborts_on_any_failure() {
    let mut h = Harness::new(
        standard_inventory(),
        standard_prices().with_error("M4A1-S | Guardian (Minimal Wear)", "502 Bad Gateway"),
    );
    h.options.failure_policy = FailurePolicy::Strict;

    let err = h.run().await.unwrap_err();
    match err {
        ValuationError::SomeItemsFailed { failed } => {
            assert_eq!(failed, vec!["M4A1-S | Guardian (Minimal Wear)"]);
        }
        other => panic!("expected SomeItemsFailed, got {other:?}"),
    }
    assert_eq!(h.snapshot_count(), 0);
    assert_eq!(h.ledger().read().unwrap(), None);
}

#[tokio::test]
async fn test_all_items_failed_is_systemic() {
    let h = Harness::new(standard_inventory(), MockPrices::new());

    let err = h.run().await.unwrap_err();
    assert!(matches!(err, ValuationError::AllItemsFailed { attempted: 3 }));
    assert_eq!(h.snapshot_count(), 0);
    assert_eq!(h.ledger().read().unwrap(), None);
}

// -- Persistence ordering --

#[tokio::test]
async fn test_persistence_failure_leaves_history_unchanged() {
    let mut h = Harness::new(standard_inventory(), standard_prices());
    let previous = t0() - ChronoDuration::days(2);
    h.ledger().write(PROJECT, previous).unwrap();
    h.sink = Some(Arc::new(FailingSink));

    let err = h.run().await.unwrap_err();
    assert!(matches!(err, ValuationError::Persistence(ref msg) if msg.contains("disk full")));
    assert_eq!(h.ledger().read().unwrap(), Some(RunHistory::new(PROJECT, previous)));
}

// -- Gate --

#[tokio::test]
async fn test_gate_denies_within_cooldown_without_fetching() {
    let h = Harness::new(standard_inventory(), standard_prices());
    h.ledger()
        .write(PROJECT, t0() - ChronoDuration::minutes(30))
        .unwrap();

    let err = h.run().await.unwrap_err();
    match err {
        ValuationError::GateDenied(GateDenial::CooldownNotElapsed { remaining, .. }) => {
            assert_eq!(remaining, Duration::from_secs(30 * 60));
        }
        other => panic!("expected cooldown denial, got {other:?}"),
    }
    assert_eq!(h.inventory.calls(), 0);
    assert_eq!(h.prices.calls(), 0);
}

#[tokio::test]
async fn test_gate_denies_project_mismatch() {
    let h = Harness::new(standard_inventory(), standard_prices());
    h.ledger()
        .write("otherproj", t0() - ChronoDuration::days(30))
        .unwrap();

    let err = h.run().await.unwrap_err();
    assert!(matches!(
        err,
        ValuationError::GateDenied(GateDenial::ProjectMismatch { .. })
    ));
    assert_eq!(
        h.ledger().read().unwrap(),
        Some(RunHistory::new("otherproj", t0() - ChronoDuration::days(30)))
    );
}

// -- Sources and prechecks --

#[tokio::test]
async fn test_inventory_failure_is_source_unavailable() {
    let h = Harness::new(standard_inventory(), standard_prices());
    h.inventory.set_error("inventory request unsuccessful: success code 15");

    let err = h.run().await.unwrap_err();
    match err {
        ValuationError::SourceUnavailable { source_name, message } => {
            assert_eq!(source_name, "inventory source");
            assert!(message.contains("success code 15"));
        }
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
    assert_eq!(h.prices.calls(), 0);
}

#[tokio::test]
async fn test_prechecks_pass_then_run() {
    let mut h = Harness::new(standard_inventory(), standard_prices());
    h.status = Some(Arc::new(MockStatus::healthy()));
    h.options.skip_services_check = false;
    h.options.skip_user_check = false;

    h.run().await.unwrap();
    assert_eq!(h.status.as_ref().unwrap().calls(), 2);
}

#[tokio::test]
async fn test_private_profile_fails_precheck() {
    let mut h = Harness::new(standard_inventory(), standard_prices());
    h.status = Some(Arc::new(MockStatus::private_profile()));
    h.options.skip_user_check = false;

    let err = h.run().await.unwrap_err();
    assert!(matches!(err, ValuationError::PrecheckFailed(ref msg) if msg.contains("not public")));
    assert_eq!(h.inventory.calls(), 0);
}

#[tokio::test]
async fn test_empty_supplement_source_rejected() {
    let mut h = Harness::new(standard_inventory(), standard_prices());
    h.supplement = Some(Supplement::default());

    let err = h.run().await.unwrap_err();
    assert!(matches!(err, ValuationError::EmptySupplementSource));
    assert_eq!(h.prices.calls(), 0);
}

// -- Cancellation --

#[tokio::test]
async fn test_cancel_during_dispatch_persists_nothing() {
    let h = Harness::new(
        standard_inventory(),
        standard_prices().with_delay("M4A1-S | Guardian (Minimal Wear)", Duration::from_secs(30)),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = h.pipeline().run(&cancel).await.unwrap_err();
    assert!(matches!(err, ValuationError::Cancelled));
    assert_eq!(h.snapshot_count(), 0);
    assert_eq!(h.ledger().read().unwrap(), None);
}
