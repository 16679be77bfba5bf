//! Snapshot builder: priced lines to an immutable valuation record.

use chrono::{DateTime, Utc};

use super::aggregator::PricedLine;
use crate::types::{ValuationError, ValuationLine, ValuationRecord, CURRENCY_LABEL};

pub fn build_snapshot(
    project_name: &str,
    timestamp: DateTime<Utc>,
    lines: Vec<PricedLine>,
) -> Result<ValuationRecord, ValuationError> {
    if lines.is_empty() {
        return Err(ValuationError::EmptySnapshot);
    }

    let items = lines
        .into_iter()
        .map(|l| ValuationLine {
            market_hash_name: l.market_hash_name,
            metadata: l.metadata,
            marketable: l.marketable,
            tradable: l.tradable,
            amount: l.amount,
            price: l.price,
            currency: CURRENCY_LABEL.to_string(),
        })
        .collect();

    Ok(ValuationRecord {
        project_name: project_name.to_string(),
        timestamp,
        items,
    })
}
