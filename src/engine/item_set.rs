//! Item set builder.
//!
//! Selects inventory items by filter policy and appends one entry per
//! supplementary key. Duplicate keys are kept as separate entries; the
//! dispatcher resolves each and the aggregator counts them.

use tracing::{debug, info};

use crate::types::{Inventory, InventoryItem, ItemMetadata, Supplement, ValuationError};

/// Which inventory view feeds the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterPolicy {
    MarketableOnly,
    #[default]
    MarketableAndTradable,
}

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    Inventory,
    /// Declared by the user. `quantity` is informational only.
    Supplement { quantity: u32 },
}

/// One logical item to price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSetEntry {
    pub market_hash_name: String,
    pub metadata: ItemMetadata,
    pub marketable: bool,
    pub tradable: bool,
    pub origin: EntryOrigin,
}

impl From<&InventoryItem> for ItemSetEntry {
    fn from(item: &InventoryItem) -> Self {
        ItemSetEntry {
            market_hash_name: item.market_hash_name.clone(),
            metadata: item.metadata.clone(),
            marketable: item.marketable,
            tradable: item.tradable,
            origin: EntryOrigin::Inventory,
        }
    }
}

impl ItemSetEntry {
    pub fn supplement(market_hash_name: &str, quantity: u32) -> Self {
        ItemSetEntry {
            market_hash_name: market_hash_name.to_string(),
            metadata: ItemMetadata::default(),
            marketable: false,
            tradable: false,
            origin: EntryOrigin::Supplement { quantity },
        }
    }
}

/// Build the ordered item set: filtered inventory first, then supplement
/// keys in key order.
///
/// `supplement` is `None` when no supplementary source is configured. A
/// configured source with zero entries is an error.
pub fn build_item_set(
    inventory: &Inventory,
    policy: FilterPolicy,
    supplement: Option<&Supplement>,
) -> Result<Vec<ItemSetEntry>, ValuationError> {
    if supplement.is_some_and(Supplement::is_empty) {
        return Err(ValuationError::EmptySupplementSource);
    }

    let selected = match policy {
        FilterPolicy::MarketableOnly => &inventory.marketable_items,
        FilterPolicy::MarketableAndTradable => &inventory.marketable_and_tradable_items,
    };

    let mut entries: Vec<ItemSetEntry> = selected.iter().map(ItemSetEntry::from).collect();
    let from_inventory = entries.len();

    if let Some(supplement) = supplement {
        entries.extend(
            supplement
                .items
                .iter()
                .map(|(key, qty)| ItemSetEntry::supplement(key, *qty)),
        );
    }

    debug!(
        policy = ?policy,
        skipped = inventory.all_items.len() - from_inventory,
        "Inventory filtered"
    );
    info!(
        inventory = from_inventory,
        supplement = entries.len() - from_inventory,
        total = entries.len(),
        "Item set built"
    );

    Ok(entries)
}
