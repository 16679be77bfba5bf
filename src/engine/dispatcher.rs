//! Concurrent valuation dispatcher.
//!
//! One price resolution per item set entry, all in flight at once, joined
//! before returning. Outcomes land in a single arena of three maps behind
//! one lock. Per-item failures are recorded, never propagated.

use futures::future::join_all;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::item_set::ItemSetEntry;
use super::median::MedianPriceResolver;
use crate::types::PriceError;

/// Per-key outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResults {
    /// Last resolved price per key.
    pub prices: BTreeMap<String, u64>,
    /// Successful resolutions per key.
    pub counts: BTreeMap<String, u32>,
    /// Last failure reason per key.
    pub failures: BTreeMap<String, String>,
}

impl DispatchResults {
    fn record(&mut self, key: &str, outcome: Result<u64, PriceError>) {
        match outcome {
            Ok(price) => {
                self.prices.insert(key.to_string(), price);
                *self.counts.entry(key.to_string()).or_insert(0) += 1;
            }
            Err(e) => {
                self.failures.insert(key.to_string(), e.to_string());
            }
        }
    }

    pub fn successes(&self) -> u64 {
        self.counts.values().map(|c| u64::from(*c)).sum()
    }
}

pub struct ValuationDispatcher {
    resolver: MedianPriceResolver,
}

impl ValuationDispatcher {
    pub fn new(resolver: MedianPriceResolver) -> Self {
        Self { resolver }
    }

    /// Resolve every entry concurrently and wait for all of them.
    ///
    /// Entries still in flight when `cancel` fires are recorded as
    /// cancelled failures; finished entries keep their results.
    pub async fn dispatch(&self, items: &[ItemSetEntry], cancel: &CancellationToken) -> DispatchResults {
        let arena = Mutex::new(DispatchResults::default());

        info!(items = items.len(), "Dispatching price lookups");

        let tasks = items.iter().map(|entry| {
            let arena = &arena;
            async move {
                let key = entry.market_hash_name.as_str();
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(PriceError::Cancelled),
                    result = self.resolver.resolve(key) => result,
                };

                match &outcome {
                    Ok(price) => debug!(item = key, price, "Price resolved"),
                    Err(e) => warn!(item = key, error = %e, "No price for item"),
                }

                arena.lock().await.record(key, outcome);
            }
        });
        join_all(tasks).await;

        let results = arena.into_inner();
        info!(
            priced_keys = results.prices.len(),
            resolutions = results.successes(),
            failed_keys = results.failures.len(),
            "Dispatch complete"
        );
        results
    }
}
