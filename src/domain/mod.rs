//! Domain types for trainr
//!
//! This module contains the core record types:
//! - RunRecord: one submitted training run with its lifecycle state
//! - MetricRecord: one per-epoch metrics entry
//! - ModelMeta: descriptor of a stored artifact

pub mod metric;
pub mod model_meta;
pub mod run_record;

pub use metric::MetricRecord;
pub use model_meta::ModelMeta;
pub use run_record::{RunRecord, RunState};
