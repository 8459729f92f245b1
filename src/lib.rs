//! trainr - multi-tenant training-run orchestration
//!
//! trainr admits long-running training jobs under global and per-tenant
//! concurrency caps, runs them on background workers without blocking
//! submitters, persists run state and per-epoch metrics durably, and stores
//! the resulting artifacts per tenant. The training and inference
//! computations themselves are external capabilities injected behind traits.

pub mod admission;
pub mod artifact;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod id;
pub mod manager;
pub mod store;

pub use error::{Result, TrainrError};
pub use manager::{RunManager, RunManagerBuilder, RunRequest};
