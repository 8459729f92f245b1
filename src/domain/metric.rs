//! Per-epoch metric record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One metric record per (run_id, epoch).
///
/// Appended to the metrics sink as an opaque log entry; duplicates from
/// retries are tolerated, never deduplicated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    pub run_id: String,

    /// 1-based epoch number, at most the run's epoch_count
    pub epoch: u32,

    /// Metric name to value, e.g. "loss", "mAP"
    pub metrics: HashMap<String, f64>,

    pub recorded_at: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a record stamped with the current time.
    pub fn new(run_id: &str, epoch: u32, metrics: HashMap<String, f64>) -> Self {
        Self {
            run_id: run_id.to_string(),
            epoch,
            metrics,
            recorded_at: Utc::now(),
        }
    }
}
