//! Shared types for the valuation pipeline.
//!
//! These types form the data model used across all modules. Sources
//! produce them, the engine folds them, storage persists them; none of
//! them depend on engine or source internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::duration::format_duration;

/// Fixed currency label attached to every persisted line.
pub const CURRENCY_LABEL: &str = "USD";

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Display metadata carried alongside an identity key.
///
/// Supplementary entries have no metadata source, so every field may be
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub name: String,
    pub name_color: String,
    pub market_name: String,
    pub icon_url: String,
    #[serde(rename = "inspect_url")]
    pub action_inspect_link: String,
    pub market_inspect_link: String,
}

/// One item as reported by the inventory source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Identity key (market hash name).
    pub market_hash_name: String,
    #[serde(flatten)]
    pub metadata: ItemMetadata,
    pub marketable: bool,
    pub tradable: bool,
}

impl fmt::Display for InventoryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (marketable: {}, tradable: {})",
            self.market_hash_name, self.marketable, self.tradable
        )
    }
}

/// The three derived views of one inventory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub all_items: Vec<InventoryItem>,
    pub marketable_items: Vec<InventoryItem>,
    pub marketable_and_tradable_items: Vec<InventoryItem>,
}

impl Inventory {
    /// Derive all three views from the raw item list in one pass.
    pub fn from_items(items: Vec<InventoryItem>) -> Self {
        let mut inventory = Inventory {
            all_items: Vec::with_capacity(items.len()),
            ..Inventory::default()
        };

        for item in items {
            if item.marketable && item.tradable {
                inventory.marketable_and_tradable_items.push(item.clone());
            }
            if item.marketable {
                inventory.marketable_items.push(item.clone());
            }
            inventory.all_items.push(item);
        }

        inventory
    }
}

/// User-declared extra items to value, keyed by identity key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplement {
    #[serde(default)]
    pub items: BTreeMap<String, u32>,
}

impl Supplement {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Lifecycle state of a market listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingState {
    Listed,
    Buffered,
    /// Sold, delisted, refunded, or anything else the source reports.
    #[serde(other)]
    Other,
}

impl ListingState {
    /// Whether a listing in this state counts towards the price basis.
    pub fn is_active(&self) -> bool {
        matches!(self, ListingState::Listed | ListingState::Buffered)
    }
}

/// One market offer for an item. Only used to derive a median.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Price in minor currency units (cents).
    pub price: u64,
    pub state: ListingState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn new(price: u64, state: ListingState) -> Self {
        Self {
            price,
            state,
            created_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Valuation record
// ---------------------------------------------------------------------------

/// One persisted line of a valuation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationLine {
    pub market_hash_name: String,
    #[serde(flatten)]
    pub metadata: ItemMetadata,
    pub marketable: bool,
    pub tradable: bool,
    /// Number of copies that resolved a price.
    pub amount: u32,
    /// Median price per copy in minor currency units.
    pub price: u64,
    pub currency: String,
}

impl ValuationLine {
    /// Price times amount, in minor currency units.
    pub fn total(&self) -> u64 {
        self.price.saturating_mul(u64::from(self.amount))
    }
}

/// Immutable, timestamped output of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub project_name: String,
    pub timestamp: DateTime<Utc>,
    pub items: Vec<ValuationLine>,
}

impl ValuationRecord {
    /// Sum of all line totals, in minor currency units.
    pub fn total_value(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, line| acc.saturating_add(line.total()))
    }

    pub fn total_amount(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.amount)).sum()
    }
}

// ---------------------------------------------------------------------------
// Run history
// ---------------------------------------------------------------------------

/// Project name and time of the last successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHistory {
    pub project_name: String,
    pub last_run: Option<DateTime<Utc>>,
}

impl RunHistory {
    pub fn new(project_name: impl Into<String>, last_run: DateTime<Utc>) -> Self {
        Self {
            project_name: project_name.into(),
            last_run: Some(last_run),
        }
    }

    /// Synthetic history for a project that has never completed a run.
    pub fn never_run(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            last_run: None,
        }
    }
}

impl fmt::Display for RunHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_run {
            Some(ts) => write!(f, "{} (last run {})", self.project_name, ts.to_rfc3339()),
            None => write!(f, "{} (never run)", self.project_name),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why the cooldown gate refused a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateDenial {
    #[error("last run project name '{history}' does not match current project name '{configured}'")]
    ProjectMismatch { history: String, configured: String },

    #[error(
        "cooldown period not met: last run was at {}, cooldown is {}, next run allowed in {}",
        .last_run.to_rfc3339(),
        format_duration(.cooldown),
        format_duration(.remaining)
    )]
    CooldownNotElapsed {
        last_run: DateTime<Utc>,
        cooldown: Duration,
        remaining: Duration,
    },
}

/// Per-item price resolution failure. Tolerated and reported.
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("no listings found for the given market hash name")]
    NoListings,

    #[error("no active listings found to calculate median price")]
    NoActiveListings,

    #[error("invalid market hash name: {0}")]
    InvalidKey(String),

    #[error("price source error: {0:#}")]
    Source(anyhow::Error),

    #[error("cancelled")]
    Cancelled,
}

/// Run-level failures. Every variant aborts the run before history moves.
#[derive(Debug, thiserror::Error)]
pub enum ValuationError {
    #[error("run denied: {0}")]
    GateDenied(#[from] GateDenial),

    #[error("{source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("pre-run check failed: {0}")]
    PrecheckFailed(String),

    #[error("credential error: {0}")]
    Credentials(String),

    #[error("supplementary item source is configured but contains no items")]
    EmptySupplementSource,

    #[error("no items to value")]
    EmptyItemSet,

    #[error("all {attempted} items have no price, check network conditions")]
    AllItemsFailed { attempted: usize },

    #[error("{} items have no price: {}", .failed.len(), .failed.join(", "))]
    SomeItemsFailed { failed: Vec<String> },

    #[error("snapshot contains no items")]
    EmptySnapshot,

    #[error("failed to persist snapshot: {0}")]
    Persistence(String),

    #[error("run history error: {0}")]
    History(String),

    #[error("run cancelled")]
    Cancelled,
}

impl ValuationError {
    pub(crate) fn source_unavailable(source_name: &str, err: &anyhow::Error) -> Self {
        ValuationError::SourceUnavailable {
            source_name: source_name.to_string(),
            message: format!("{err:#}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
