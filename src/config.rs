//! Configuration for trainr
//!
//! Loaded from ./trainr.yml or ~/.config/trainr/trainr.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrainrError;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainrConfig {
    /// Concurrency limits.
    pub limits: LimitsConfig,

    /// Device handed to the training capability.
    pub device: String,

    /// Storage settings.
    pub storage: StorageConfig,
}

impl TrainrConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. trainr.yml in current directory
    /// 3. ~/.config/trainr/trainr.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project config
        let project_config = PathBuf::from("trainr.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from trainr.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load trainr.yml: {}", e);
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("trainr").join("trainr.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.limits.global == 0 {
            return Err(TrainrError::InvalidLimit("limits.global must be > 0".to_string()));
        }
        if self.limits.per_tenant == 0 {
            return Err(TrainrError::InvalidLimit("limits.per-tenant must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Concurrency limits for run admission.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum runs executing at once, across all tenants.
    pub global: usize,

    /// Maximum concurrent runs per tenant.
    #[serde(rename = "per-tenant")]
    pub per_tenant: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            global: 1,
            per_tenant: 1,
        }
    }
}

/// Storage locations and backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the run-state and metrics databases.
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Artifact root; defaults to `<data-dir>/artifacts`.
    #[serde(rename = "artifact-root")]
    pub artifact_root: Option<PathBuf>,

    /// Metrics backend to use.
    #[serde(rename = "metrics-backend")]
    pub metrics_backend: MetricsBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|home| home.join(".trainr"))
            .unwrap_or_else(|| PathBuf::from(".trainr"));
        Self {
            data_dir,
            artifact_root: None,
            metrics_backend: MetricsBackend::Sqlite,
        }
    }
}

impl StorageConfig {
    /// Resolved artifact root.
    pub fn artifact_root(&self) -> PathBuf {
        self.artifact_root
            .clone()
            .unwrap_or_else(|| self.data_dir.join("artifacts"))
    }
}

/// Metrics sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsBackend {
    Sqlite,
    Jsonl,
}

impl Default for TrainrConfig {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            device: "cpu".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TrainrConfig::default();
        assert_eq!(config.limits.global, 1);
        assert_eq!(config.limits.per_tenant, 1);
        assert_eq!(config.device, "cpu");
        assert_eq!(config.storage.metrics_backend, MetricsBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_artifact_root_defaults_under_data_dir() {
        let config = TrainrConfig::default();
        assert_eq!(config.storage.artifact_root(), config.storage.data_dir.join("artifacts"));
    }

    #[test]
    fn test_artifact_root_override() {
        let mut config = TrainrConfig::default();
        config.storage.artifact_root = Some(PathBuf::from("/srv/models"));
        assert_eq!(config.storage.artifact_root(), PathBuf::from("/srv/models"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = TrainrConfig::default();
        config.limits.global = 0;
        assert!(matches!(config.validate(), Err(TrainrError::InvalidLimit(_))));

        let mut config = TrainrConfig::default();
        config.limits.per_tenant = 0;
        assert!(matches!(config.validate(), Err(TrainrError::InvalidLimit(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trainr.yml");
        fs::write(
            &path,
            r#"
limits:
  global: 4
  per-tenant: 2
device: cuda:0
storage:
  data-dir: /var/lib/trainr
  metrics-backend: jsonl
"#,
        )
        .unwrap();

        let config = TrainrConfig::load(Some(&path)).unwrap();
        assert_eq!(config.limits.global, 4);
        assert_eq!(config.limits.per_tenant, 2);
        assert_eq!(config.device, "cuda:0");
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/trainr"));
        assert_eq!(config.storage.metrics_backend, MetricsBackend::Jsonl);
    }

    #[test]
    fn test_load_explicit_path_missing_fails() {
        let path = PathBuf::from("/nonexistent/trainr.yml");
        assert!(TrainrConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trainr.yml");
        fs::write(&path, "limits:\n  global: 8\n").unwrap();

        let config = TrainrConfig::load(Some(&path)).unwrap();
        assert_eq!(config.limits.global, 8);
        assert_eq!(config.limits.per_tenant, 1);
        assert_eq!(config.device, "cpu");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = TrainrConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: TrainrConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.limits.global, config.limits.global);
        assert_eq!(parsed.device, config.device);
    }
}
