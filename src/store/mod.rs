//! Durable stores for run state and training metrics
//!
//! Two independent persistence contracts sit behind traits so the concrete
//! backend is chosen by configuration at construction:
//! - `RunStateStore`: upsert-by-run_id records with bulk reload for crash
//!   recovery
//! - `MetricsSink`: append-only per-epoch metric log

mod metrics;
mod run_state;

pub use metrics::{JsonlMetricsSink, MetricsSink, SqliteMetricsSink};
pub use run_state::{RunStateStore, SqliteRunStateStore};
