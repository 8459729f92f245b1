//! Mock capability implementations for tests
//!
//! Scriptable stand-ins for the training and inference backends: fixed
//! per-epoch metrics, artificial latency, failure injection, and a peak
//! concurrency probe for asserting admission limits.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{EpochMetrics, InferenceEngine, InferenceResult, Prediction, TrainingEngine, TrainingOutcome};
use crate::error::{Result, TrainrError};

/// Scriptable training engine.
///
/// Each `train` call writes a fresh artifact directory (with
/// `weights/best.pt`) under the configured workdir, so the saved artifact is
/// a real, resolvable file.
#[derive(Debug)]
pub struct MockTrainingEngine {
    workdir: PathBuf,
    scripted: Option<Vec<EpochMetrics>>,
    labels: Vec<String>,
    delay: Duration,
    fail_with: Option<String>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl MockTrainingEngine {
    /// Engine that trains instantly and reports a decreasing loss curve.
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            scripted: None,
            labels: Vec::new(),
            delay: Duration::ZERO,
            fail_with: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        }
    }

    /// Report exactly these per-epoch metrics instead of the generated curve.
    pub fn with_metrics(mut self, per_epoch: Vec<EpochMetrics>) -> Self {
        self.scripted = Some(per_epoch);
        self
    }

    /// Report these class labels with the trained artifact.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Sleep this long inside every `train` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every `train` call with this capability error.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Total number of `train` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `train` calls that were ever in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrainingEngine for MockTrainingEngine {
    async fn train(
        &self,
        _base_model_ref: &str,
        _dataset_ref: &str,
        epoch_count: u32,
        _device: &str,
    ) -> Result<TrainingOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);

        let result = self.run(call, epoch_count).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MockTrainingEngine {
    async fn run(&self, call: usize, epoch_count: u32) -> Result<TrainingOutcome> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(message) = &self.fail_with {
            return Err(TrainrError::Capability(message.clone()));
        }

        let per_epoch = match &self.scripted {
            Some(scripted) => scripted.clone(),
            None => (0..epoch_count)
                .map(|i| EpochMetrics {
                    loss: 1.0 / (i + 1) as f64,
                    map: 1.0 - 1.0 / (i + 2) as f64,
                })
                .collect(),
        };

        let artifact_dir = self.workdir.join(format!("train-{}", call));
        let weights_dir = artifact_dir.join("weights");
        std::fs::create_dir_all(&weights_dir)?;
        std::fs::write(weights_dir.join("best.pt"), format!("mock-weights-{}", call))?;

        Ok(TrainingOutcome {
            per_epoch,
            artifact_dir,
            labels: self.labels.clone(),
        })
    }
}

/// Scriptable inference engine: one fixed prediction per input image.
#[derive(Debug, Default)]
pub struct MockInferenceEngine {
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl MockInferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `infer` call with this capability error.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Total number of `infer` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceEngine for MockInferenceEngine {
    async fn infer(
        &self,
        model_path: &Path,
        inputs: &[String],
        conf_threshold: f64,
        _iou_threshold: f64,
    ) -> Result<Vec<InferenceResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_with {
            return Err(TrainrError::Capability(message.clone()));
        }
        if !model_path.exists() {
            return Err(TrainrError::Capability(format!(
                "model file missing: {}",
                model_path.display()
            )));
        }

        Ok(inputs
            .iter()
            .map(|image| InferenceResult {
                image: image.clone(),
                predictions: vec![Prediction {
                    bbox: [0.0, 0.0, 10.0, 10.0],
                    score: conf_threshold.max(0.5),
                    label: 0,
                }],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mock_train_generates_metrics_and_artifact() {
        let temp = TempDir::new().unwrap();
        let engine = MockTrainingEngine::new(temp.path());

        let outcome = engine.train("base", "ds", 3, "cpu").await.unwrap();

        assert_eq!(outcome.per_epoch.len(), 3);
        let best = outcome.best_checkpoint().unwrap();
        assert!(best.exists());
    }

    #[tokio::test]
    async fn test_mock_train_scripted_metrics() {
        let temp = TempDir::new().unwrap();
        let scripted = vec![
            EpochMetrics { loss: 0.9, map: 0.1 },
            EpochMetrics { loss: 0.5, map: 0.4 },
        ];
        let engine = MockTrainingEngine::new(temp.path()).with_metrics(scripted.clone());

        let outcome = engine.train("base", "ds", 2, "cpu").await.unwrap();
        assert_eq!(outcome.per_epoch, scripted);
    }

    #[tokio::test]
    async fn test_mock_train_failure_injection() {
        let temp = TempDir::new().unwrap();
        let engine = MockTrainingEngine::new(temp.path()).failing_with("gpu on fire");

        let err = engine.train("base", "ds", 1, "cpu").await.unwrap_err();
        assert!(matches!(err, TrainrError::Capability(_)));
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_train_distinct_artifacts_per_call() {
        let temp = TempDir::new().unwrap();
        let engine = MockTrainingEngine::new(temp.path());

        let first = engine.train("base", "ds", 1, "cpu").await.unwrap();
        let second = engine.train("base", "ds", 1, "cpu").await.unwrap();
        assert_ne!(first.artifact_dir, second.artifact_dir);
    }

    #[tokio::test]
    async fn test_mock_train_peak_concurrency() {
        let temp = TempDir::new().unwrap();
        let engine = std::sync::Arc::new(
            MockTrainingEngine::new(temp.path()).with_delay(Duration::from_millis(50)),
        );

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let engine = std::sync::Arc::clone(&engine);
                tokio::spawn(async move { engine.train("base", "ds", 1, "cpu").await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(engine.peak_concurrency(), 3);
    }

    #[tokio::test]
    async fn test_mock_infer_one_result_per_input() {
        let temp = TempDir::new().unwrap();
        let model = temp.path().join("model.pt");
        std::fs::write(&model, "w").unwrap();

        let engine = MockInferenceEngine::new();
        let inputs = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        let results = engine.infer(&model, &inputs, 0.25, 0.45).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].image, "a.jpg");
        assert_eq!(results[0].predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_infer_missing_model() {
        let engine = MockInferenceEngine::new();
        let err = engine
            .infer(Path::new("/nonexistent/model.pt"), &["a.jpg".to_string()], 0.25, 0.45)
            .await
            .unwrap_err();
        assert!(matches!(err, TrainrError::Capability(_)));
    }
}
