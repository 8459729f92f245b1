//! Run record and lifecycle state
//!
//! A Run is one submitted training job. The record is created at submission,
//! mutated only by the worker driving that run, and snapshotted into the
//! run-state store at the Running entry and at the terminal transition.

use crate::id::{generate_run_id, now_ms};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One submitted training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    /// Unique identifier (timestamp + random suffix: "1738300800123-a1b2")
    pub run_id: String,

    /// Owning tenant; used for admission and storage isolation
    pub tenant_id: String,

    /// Caller-chosen label, seeds the artifact name; not unique across time
    pub run_name: String,

    /// Opaque reference to the base model handed to the training engine
    pub base_model_ref: String,

    /// Opaque reference to the dataset handed to the training engine
    pub dataset_ref: String,

    /// Requested number of training epochs
    pub epoch_count: u32,

    /// Current lifecycle state
    pub state: RunState,

    /// Set only on Completed; resolved artifact location
    pub final_artifact_path: Option<PathBuf>,

    /// Set only on Failed; the capability error that killed the run
    pub error: Option<String>,

    /// Unix timestamp in milliseconds
    pub created_at: i64,

    /// Unix timestamp in milliseconds
    pub updated_at: i64,
}

/// Lifecycle state of a run.
///
/// ```text
/// Queued --> Running --> Completed
///                    \-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Submitted, worker not yet admitted
    Queued,
    /// Admitted, training in progress
    Running,
    /// Training succeeded, artifact saved
    Completed,
    /// Training or artifact save failed
    Failed,
}

impl RunState {
    /// Returns true if the run can make no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Stable string form, matches the serde rename
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }
}

impl RunRecord {
    /// Create a new Queued record for a submission.
    pub fn new(
        tenant_id: &str,
        base_model_ref: &str,
        dataset_ref: &str,
        epoch_count: u32,
        run_name: &str,
    ) -> Self {
        let now = now_ms() as i64;
        Self {
            run_id: generate_run_id(),
            tenant_id: tenant_id.to_string(),
            run_name: run_name.to_string(),
            base_model_ref: base_model_ref.to_string(),
            dataset_ref: dataset_ref.to_string(),
            epoch_count,
            state: RunState::Queued,
            final_artifact_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = now_ms() as i64;
    }
}
