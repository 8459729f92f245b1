//! Run lifecycle management
//!
//! Orchestrates run submission, admission, execution, and finalization.

mod builder;
mod run_manager;

pub use builder::RunManagerBuilder;
pub use run_manager::{
    DEFAULT_CONF_THRESHOLD, DEFAULT_IOU_THRESHOLD, ProgressCallback, RunManager, RunRequest,
};
