//! Construction of a RunManager from configuration
//!
//! The builder picks the concrete store variants from `TrainrConfig` and
//! wires them together; the capability engines are injected by the caller.

use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::artifact::LocalFsArtifactStore;
use crate::config::{MetricsBackend, TrainrConfig};
use crate::engine::{InferenceEngine, TrainingEngine};
use crate::error::{Result, TrainrError};
use crate::manager::RunManager;
use crate::store::{JsonlMetricsSink, MetricsSink, SqliteMetricsSink, SqliteRunStateStore};

/// Builds a RunManager with config-selected storage backends.
pub struct RunManagerBuilder {
    config: TrainrConfig,
    training: Option<Arc<dyn TrainingEngine>>,
    inference: Option<Arc<dyn InferenceEngine>>,
}

impl RunManagerBuilder {
    pub fn new(config: TrainrConfig) -> Self {
        Self {
            config,
            training: None,
            inference: None,
        }
    }

    /// Inject the training capability.
    pub fn training_engine(mut self, engine: Arc<dyn TrainingEngine>) -> Self {
        self.training = Some(engine);
        self
    }

    /// Inject the inference capability.
    pub fn inference_engine(mut self, engine: Arc<dyn InferenceEngine>) -> Self {
        self.inference = Some(engine);
        self
    }

    /// Validate the config, open the stores, and construct the manager.
    pub fn build(self) -> Result<RunManager> {
        self.config.validate()?;

        let training = self
            .training
            .ok_or_else(|| TrainrError::Validation("training engine is required".to_string()))?;
        let inference = self
            .inference
            .ok_or_else(|| TrainrError::Validation("inference engine is required".to_string()))?;

        let data_dir = &self.config.storage.data_dir;
        let admission = AdmissionController::new(self.config.limits.global, self.config.limits.per_tenant)?;
        let run_state = Arc::new(SqliteRunStateStore::open(data_dir.join("runs.db"))?);
        let metrics: Arc<dyn MetricsSink> = match self.config.storage.metrics_backend {
            MetricsBackend::Sqlite => Arc::new(SqliteMetricsSink::open(data_dir.join("metrics.db"))?),
            MetricsBackend::Jsonl => Arc::new(JsonlMetricsSink::open(data_dir.join("metrics.jsonl"))?),
        };
        let artifacts = Arc::new(LocalFsArtifactStore::open(self.config.storage.artifact_root())?);

        RunManager::new(
            admission,
            run_state,
            metrics,
            artifacts,
            training,
            inference,
            &self.config.device,
        )
    }
}
