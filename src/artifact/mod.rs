//! Artifact storage abstraction
//!
//! Trained model artifacts are persisted per tenant behind the
//! `ArtifactStore` trait; the concrete backend is chosen at construction.

mod local_fs;

use std::path::{Path, PathBuf};

use crate::domain::ModelMeta;
use crate::error::Result;

pub use local_fs::LocalFsArtifactStore;

/// Tenant-isolated persistence of trained model artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Copy the artifact at `src_path` into the tenant's storage under a
    /// name derived from `model_name` that never collides with a prior save.
    /// Returns the resolved destination path. The source is never mutated.
    fn save(&self, tenant_id: &str, src_path: &Path, model_name: &str, labels: &[String]) -> Result<PathBuf>;

    /// All artifacts for a tenant, in stable (lexicographic) order, no
    /// duplicates.
    fn list(&self, tenant_id: &str) -> Result<Vec<ModelMeta>>;

    /// Resolve a model name to the most recently saved matching artifact.
    /// Fails with `NotFound` when nothing matches.
    fn get_path(&self, tenant_id: &str, model_name: &str) -> Result<PathBuf>;

    /// Remove every artifact saved under the model name, along with any
    /// auxiliary label data. Returns false when nothing matched.
    fn delete(&self, tenant_id: &str, model_name: &str) -> Result<bool>;
}
