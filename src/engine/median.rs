//! Median price resolver.
//!
//! Fetches one page of listings for an identity key and reduces the active
//! ones to their median price. No caching between calls.

use std::sync::Arc;
use tracing::debug;

use crate::sources::PriceSource;
use crate::types::{Listing, PriceError};

/// Median of the active listings' prices.
///
/// Odd count: the middle element. Even count: floor of the mean of the two
/// middle elements.
pub fn median_price(listings: &[Listing]) -> Result<u64, PriceError> {
    if listings.is_empty() {
        return Err(PriceError::NoListings);
    }

    let mut prices: Vec<u64> = listings
        .iter()
        .filter(|l| l.state.is_active())
        .map(|l| l.price)
        .collect();

    if prices.is_empty() {
        return Err(PriceError::NoActiveListings);
    }

    prices.sort_unstable();

    let mid = prices.len() / 2;
    if prices.len() % 2 == 1 {
        return Ok(prices[mid]);
    }

    let (a, b) = (prices[mid - 1], prices[mid]);
    // Overflow-free floor((a + b) / 2).
    Ok(a / 2 + b / 2 + (a % 2 + b % 2) / 2)
}

/// Resolves one identity key to a price through a [`PriceSource`].
#[derive(Clone)]
pub struct MedianPriceResolver {
    source: Arc<dyn PriceSource>,
}

impl MedianPriceResolver {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self { source }
    }

    pub async fn resolve(&self, market_hash_name: &str) -> Result<u64, PriceError> {
        if market_hash_name.trim().is_empty() {
            return Err(PriceError::InvalidKey("market hash name cannot be empty".into()));
        }

        let listings = self
            .source
            .fetch_listings(market_hash_name)
            .await
            .map_err(PriceError::Source)?;

        let price = median_price(&listings)?;
        debug!(item = market_hash_name, listings = listings.len(), price, "Median price resolved");
        Ok(price)
    }
}
