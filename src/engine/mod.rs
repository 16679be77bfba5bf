//! Valuation engine: the run gate, item set construction, concurrent pricing and aggregation.

pub mod aggregator;
pub mod dispatcher;
pub mod gate;
pub mod item_set;
pub mod median;
pub mod pipeline;
pub mod snapshot;

pub use aggregator::{aggregate, Aggregation, FailureEntry, FailurePolicy, PricedLine};
pub use dispatcher::{DispatchResults, ValuationDispatcher};
pub use gate::{check_gate, remaining_cooldown, GateDecision};
pub use item_set::{build_item_set, EntryOrigin, FilterPolicy, ItemSetEntry};
pub use median::{median_price, MedianPriceResolver};
pub use pipeline::{
    Clock, PipelineSources, PipelineStorage, RunOptions, RunSummary, ValuationPipeline,
};
pub use snapshot::build_snapshot;
