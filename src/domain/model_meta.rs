//! Persisted artifact descriptor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Descriptor of one stored model artifact.
///
/// Owned by the artifact store and returned by value; the path is resolved
/// and absolute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMeta {
    /// Stored name, including the disambiguating sequence suffix
    pub model_name: String,

    /// Absolute location of the artifact file
    pub path: PathBuf,

    /// Class labels, possibly empty
    pub labels: Vec<String>,

    pub created_at: DateTime<Utc>,
}
