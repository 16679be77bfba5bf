//! Valuation aggregator.
//!
//! Folds the dispatcher's maps back onto the item set: one priced line per
//! resolved key, one failure entry per failed key. Run-level failure
//! policies are enforced separately so callers can report first.

use std::collections::{BTreeMap, HashSet};
use tracing::info;

use super::dispatcher::DispatchResults;
use super::item_set::ItemSetEntry;
use crate::types::{ItemMetadata, ValuationError};

/// A resolved key with its held count, before the currency label is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub market_hash_name: String,
    pub metadata: ItemMetadata,
    pub marketable: bool,
    pub tradable: bool,
    pub amount: u32,
    pub price: u64,
}

impl PricedLine {
    pub fn total(&self) -> u64 {
        self.price.saturating_mul(u64::from(self.amount))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub market_hash_name: String,
    pub reason: String,
    /// Copies of this key that did not resolve.
    pub failed_copies: u32,
    /// Copies of this key that resolved on another attempt.
    pub priced_copies: u32,
}

/// How partial failures affect the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Only abort when nothing resolved.
    Tolerant,
    /// Abort on any failure.
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Ordered by first appearance in the item set.
    pub lines: Vec<PricedLine>,
    /// Ordered by key.
    pub failures: Vec<FailureEntry>,
    /// Item set size.
    pub attempted: usize,
}

impl Aggregation {
    pub fn priced_copies(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.amount)).sum()
    }

    pub fn failed_copies(&self) -> u64 {
        self.failures.iter().map(|f| u64::from(f.failed_copies)).sum()
    }

    pub fn total_value(&self) -> u64 {
        self.lines.iter().fold(0u64, |acc, l| acc.saturating_add(l.total()))
    }

    /// Apply the run-level thresholds.
    pub fn enforce(&self, policy: FailurePolicy) -> Result<(), ValuationError> {
        if self.attempted == 0 {
            return Err(ValuationError::EmptyItemSet);
        }
        if self.lines.is_empty() {
            return Err(ValuationError::AllItemsFailed {
                attempted: self.attempted,
            });
        }
        if policy == FailurePolicy::Strict && !self.failures.is_empty() {
            return Err(ValuationError::SomeItemsFailed {
                failed: self
                    .failures
                    .iter()
                    .map(|f| f.market_hash_name.clone())
                    .collect(),
            });
        }
        Ok(())
    }
}

pub fn aggregate(items: &[ItemSetEntry], results: &DispatchResults) -> Aggregation {
    let mut occurrences: BTreeMap<&str, u32> = BTreeMap::new();
    for entry in items {
        *occurrences.entry(entry.market_hash_name.as_str()).or_insert(0) += 1;
    }

    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(results.prices.len());
    for entry in items {
        let key = entry.market_hash_name.as_str();
        if !seen.insert(key) {
            continue;
        }
        let Some(&price) = results.prices.get(key) else {
            continue;
        };
        let amount = results.counts.get(key).copied().unwrap_or(0);
        if amount == 0 {
            continue;
        }
        lines.push(PricedLine {
            market_hash_name: key.to_string(),
            metadata: entry.metadata.clone(),
            marketable: entry.marketable,
            tradable: entry.tradable,
            amount,
            price,
        });
    }

    let failures = results
        .failures
        .iter()
        .map(|(key, reason)| {
            let priced = results.counts.get(key).copied().unwrap_or(0);
            let total = occurrences.get(key.as_str()).copied().unwrap_or(0);
            FailureEntry {
                market_hash_name: key.clone(),
                reason: reason.clone(),
                failed_copies: total.saturating_sub(priced),
                priced_copies: priced,
            }
        })
        .collect();

    let aggregation = Aggregation {
        lines,
        failures,
        attempted: items.len(),
    };

    info!(
        attempted = aggregation.attempted,
        lines = aggregation.lines.len(),
        priced_copies = aggregation.priced_copies(),
        failed_keys = aggregation.failures.len(),
        total_value = aggregation.total_value(),
        "Results aggregated"
    );
    aggregation
}
