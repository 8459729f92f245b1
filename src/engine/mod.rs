//! External capability ports
//!
//! Training and inference are opaque, externally supplied capabilities. The
//! manager only depends on these traits; concrete backends are injected at
//! construction. `MockTrainingEngine` and `MockInferenceEngine` are exported
//! for integration tests.

mod mock;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use mock::{MockInferenceEngine, MockTrainingEngine};

/// Metrics reported by the training capability for one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub loss: f64,
    pub map: f64,
}

impl EpochMetrics {
    /// Metric map keyed the way the sinks store it.
    pub fn to_map(self) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert("loss".to_string(), self.loss);
        m.insert("mAP".to_string(), self.map);
        m
    }
}

/// Result of a completed training call.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// One entry per epoch actually trained
    pub per_epoch: Vec<EpochMetrics>,

    /// Directory the engine wrote its outputs into; the best checkpoint is
    /// expected under `weights/best*`
    pub artifact_dir: PathBuf,

    /// Class labels the trained model predicts, possibly empty
    pub labels: Vec<String>,
}

impl TrainingOutcome {
    /// Path of the best checkpoint inside the outcome directory.
    pub fn best_checkpoint(&self) -> Result<PathBuf> {
        let weights_dir = self.artifact_dir.join("weights");
        for entry in std::fs::read_dir(&weights_dir)? {
            let path = entry?.path();
            if path.is_file()
                && path
                    .file_stem()
                    .is_some_and(|stem| stem.to_string_lossy() == "best")
            {
                return Ok(path);
            }
        }
        Err(crate::error::TrainrError::Capability(format!(
            "no best checkpoint under {}",
            weights_dir.display()
        )))
    }
}

/// Black-box training capability.
#[async_trait]
pub trait TrainingEngine: Send + Sync {
    /// Train from a base model over a dataset for the given number of epochs.
    async fn train(
        &self,
        base_model_ref: &str,
        dataset_ref: &str,
        epoch_count: u32,
        device: &str,
    ) -> Result<TrainingOutcome>;
}

/// One detection produced by the inference capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    /// [x1, y1, x2, y2]
    pub bbox: [f64; 4],
    pub score: f64,
    /// Class index into the model's label list
    pub label: u32,
}

/// Predictions for one input image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceResult {
    pub image: String,
    pub predictions: Vec<Prediction>,
}

/// Black-box inference capability.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Run the model at `model_path` over the inputs.
    async fn infer(
        &self,
        model_path: &Path,
        inputs: &[String],
        conf_threshold: f64,
        iou_threshold: f64,
    ) -> Result<Vec<InferenceResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_epoch_metrics_to_map() {
        let m = EpochMetrics { loss: 0.9, map: 0.1 }.to_map();
        assert_eq!(m["loss"], 0.9);
        assert_eq!(m["mAP"], 0.1);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_best_checkpoint_found() {
        let temp = TempDir::new().unwrap();
        let weights = temp.path().join("weights");
        std::fs::create_dir_all(&weights).unwrap();
        std::fs::write(weights.join("best.pt"), "w").unwrap();
        std::fs::write(weights.join("last.pt"), "w").unwrap();

        let outcome = TrainingOutcome {
            per_epoch: vec![],
            artifact_dir: temp.path().to_path_buf(),
            labels: vec![],
        };
        let path = outcome.best_checkpoint().unwrap();
        assert_eq!(path, weights.join("best.pt"));
    }

    #[test]
    fn test_best_checkpoint_missing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("weights")).unwrap();

        let outcome = TrainingOutcome {
            per_epoch: vec![],
            artifact_dir: temp.path().to_path_buf(),
            labels: vec![],
        };
        assert!(outcome.best_checkpoint().is_err());
    }

    #[test]
    fn test_prediction_serialization() {
        let pred = Prediction {
            bbox: [1.0, 2.0, 3.0, 4.0],
            score: 0.87,
            label: 2,
        };
        let json = serde_json::to_string(&pred).unwrap();
        let parsed: Prediction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pred);
    }
}
