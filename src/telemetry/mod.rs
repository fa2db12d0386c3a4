//! Run-level metrics: cumulative counters and derived gauges that outlive
//! individual sweeps, persisted on `runs` rows for dashboards.

pub mod aggregate;
pub mod repository;
pub mod sync;

pub use aggregate::{MetricsSnapshot, MetricsUpdate, aggregate, percentile_95};
pub use repository::RunRecord;
pub use sync::sync_run_metrics;
