//! Run lifecycle orchestration
//!
//! The RunManager owns the in-memory run registry and drives every submitted
//! job through Queued -> Running -> Completed/Failed on a worker task:
//! 1. `submit` validates, records the run as Queued, and returns immediately
//! 2. the worker acquires admission slots (the backpressure point)
//! 3. the training capability runs; per-epoch metrics stream to the sink and
//!    to the caller's progress callback
//! 4. the artifact is saved, the final record persisted, slots released
//!
//! After creation only the run's own worker writes its record; arbitrary
//! callers read concurrently through snapshots.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinHandle;

use crate::admission::AdmissionController;
use crate::artifact::ArtifactStore;
use crate::domain::{ModelMeta, RunRecord, RunState};
use crate::engine::{InferenceEngine, InferenceResult, TrainingEngine};
use crate::error::{Result, TrainrError};
use crate::store::{MetricsSink, RunStateStore};

/// Default confidence threshold for inference.
pub const DEFAULT_CONF_THRESHOLD: f64 = 0.25;

/// Default IoU threshold for inference.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.45;

/// Caller-supplied progress hook: `(run_id, epoch, metrics)`.
///
/// Invoked best-effort after each epoch's metrics are recorded; a panicking
/// callback is caught and logged, never allowed to abort the run.
pub type ProgressCallback = Arc<dyn Fn(&str, u32, &HashMap<String, f64>) + Send + Sync>;

/// Everything needed to submit one training run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub tenant_id: String,
    pub base_model_ref: String,
    pub dataset_ref: String,
    pub epoch_count: u32,
    pub run_name: String,
}

/// Top-level orchestrator for training runs.
///
/// Cheap to clone; clones share the registry, stores, and admission state.
#[derive(Clone)]
pub struct RunManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    admission: AdmissionController,
    run_state: Arc<dyn RunStateStore>,
    metrics: Arc<dyn MetricsSink>,
    artifacts: Arc<dyn ArtifactStore>,
    training: Arc<dyn TrainingEngine>,
    inference: Arc<dyn InferenceEngine>,
    device: String,
    /// In-memory run registry; single writer per run_id, many readers
    registry: RwLock<HashMap<String, RunRecord>>,
    /// Handles of spawned job bodies; internal only, callers see run_ids
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for RunManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunManager")
            .field("device", &self.inner.device)
            .finish_non_exhaustive()
    }
}

impl RunManager {
    /// Create a manager and reload all previously persisted runs.
    ///
    /// Records that were `Running` at the last persistence are reloaded
    /// as-is and logged; they are not resumed.
    pub fn new(
        admission: AdmissionController,
        run_state: Arc<dyn RunStateStore>,
        metrics: Arc<dyn MetricsSink>,
        artifacts: Arc<dyn ArtifactStore>,
        training: Arc<dyn TrainingEngine>,
        inference: Arc<dyn InferenceEngine>,
        device: &str,
    ) -> Result<Self> {
        let recovered = run_state.load_all()?;
        for record in recovered.values() {
            if record.state == RunState::Running {
                tracing::warn!(
                    run_id = %record.run_id,
                    tenant_id = %record.tenant_id,
                    "Reloaded run still marked running from a previous process; it will not be resumed"
                );
            }
        }
        if !recovered.is_empty() {
            tracing::info!(count = recovered.len(), "Recovered persisted runs");
        }

        Ok(Self {
            inner: Arc::new(ManagerInner {
                admission,
                run_state,
                metrics,
                artifacts,
                training,
                inference,
                device: device.to_string(),
                registry: RwLock::new(recovered),
                workers: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Submit a training run and return its id immediately.
    ///
    /// Never blocks on admission or on the training capability; the returned
    /// run_id is valid for `query_run` before the worker starts.
    pub fn submit(&self, request: RunRequest, progress: Option<ProgressCallback>) -> Result<String> {
        if request.tenant_id.is_empty() {
            return Err(TrainrError::Validation("tenant_id must not be empty".to_string()));
        }
        if request.run_name.is_empty() {
            return Err(TrainrError::Validation("run_name must not be empty".to_string()));
        }

        let record = RunRecord::new(
            &request.tenant_id,
            &request.base_model_ref,
            &request.dataset_ref,
            request.epoch_count,
            &request.run_name,
        );
        let run_id = record.run_id.clone();

        self.inner.registry.write().unwrap().insert(run_id.clone(), record.clone());
        self.inner.persist(&record);

        tracing::info!(
            run_id = %run_id,
            tenant_id = %request.tenant_id,
            run_name = %request.run_name,
            epochs = request.epoch_count,
            "Run submitted"
        );

        let inner = Arc::clone(&self.inner);
        let job_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            inner.run_job(job_run_id, progress).await;
        });
        self.inner.workers.lock().unwrap().push(handle);

        Ok(run_id)
    }

    /// Snapshot of a run record, if known.
    pub fn query_run(&self, run_id: &str) -> Option<RunRecord> {
        self.inner.registry.read().unwrap().get(run_id).cloned()
    }

    /// Snapshots of all known runs, oldest first.
    pub fn list_runs(&self) -> Vec<RunRecord> {
        let mut runs: Vec<RunRecord> = self.inner.registry.read().unwrap().values().cloned().collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.run_id.cmp(&b.run_id)));
        runs
    }

    /// All stored models for a tenant.
    pub fn list_models(&self, tenant_id: &str) -> Result<Vec<ModelMeta>> {
        self.inner.artifacts.list(tenant_id)
    }

    /// Delete a tenant's model; false when nothing matched.
    pub fn delete_model(&self, tenant_id: &str, model_name: &str) -> Result<bool> {
        self.inner.artifacts.delete(tenant_id, model_name)
    }

    /// Run inference with a tenant's stored model.
    ///
    /// Resolves the most recent artifact for `model_name` (typed `NotFound`
    /// on miss) and forwards to the inference capability.
    pub async fn infer(
        &self,
        tenant_id: &str,
        model_name: &str,
        inputs: &[String],
        conf_threshold: f64,
        iou_threshold: f64,
    ) -> Result<Vec<InferenceResult>> {
        let model_path = self.inner.artifacts.get_path(tenant_id, model_name)?;
        self.inner
            .inference
            .infer(&model_path, inputs, conf_threshold, iou_threshold)
            .await
    }

    /// Await every outstanding job body.
    ///
    /// After this resolves no worker is live; submitted runs have reached a
    /// terminal state.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = self.inner.workers.lock().unwrap().drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = ?e, "Run worker panicked");
            }
        }
    }
}

impl ManagerInner {
    /// Job body: the whole lifecycle of one run, on a worker task.
    async fn run_job(self: Arc<Self>, run_id: String, progress: Option<ProgressCallback>) {
        let record = {
            let registry = self.registry.read().unwrap();
            match registry.get(&run_id) {
                Some(record) => record.clone(),
                None => {
                    tracing::error!(run_id = %run_id, "Run vanished from registry before start");
                    return;
                }
            }
        };

        // Backpressure point: blocks this worker, never the submitter. The
        // permit releases both slots on every exit path below.
        let _permit = match self.admission.acquire(&record.tenant_id).await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Admission failed");
                self.finish(&run_id, Err(e.to_string()));
                return;
            }
        };

        self.transition(&run_id, |r| r.state = RunState::Running);
        tracing::info!(run_id = %run_id, tenant_id = %record.tenant_id, "Run admitted");

        let outcome = self
            .training
            .train(
                &record.base_model_ref,
                &record.dataset_ref,
                record.epoch_count,
                &self.device,
            )
            .await;

        match outcome {
            Ok(outcome) => {
                for (idx, epoch_metrics) in outcome.per_epoch.iter().enumerate() {
                    let epoch = (idx + 1) as u32;
                    let metrics = epoch_metrics.to_map();

                    // Durability is best-effort mid-run: a failed append is
                    // logged, the run keeps going.
                    if let Err(e) = self.metrics.append(&run_id, epoch, &metrics) {
                        tracing::warn!(run_id = %run_id, epoch, error = %e, "Metric append failed");
                    }

                    if let Some(callback) = &progress {
                        let guarded = catch_unwind(AssertUnwindSafe(|| callback(&run_id, epoch, &metrics)));
                        if guarded.is_err() {
                            tracing::warn!(run_id = %run_id, epoch, "Progress callback panicked; ignored");
                        }
                    }
                }

                let saved = outcome.best_checkpoint().and_then(|checkpoint| {
                    self.artifacts
                        .save(&record.tenant_id, &checkpoint, &record.run_name, &outcome.labels)
                });
                match saved {
                    Ok(artifact_path) => {
                        tracing::info!(run_id = %run_id, path = %artifact_path.display(), "Run completed");
                        self.finish(&run_id, Ok(artifact_path));
                    }
                    Err(e) => {
                        tracing::error!(run_id = %run_id, error = %e, "Artifact save failed");
                        self.finish(&run_id, Err(e.to_string()));
                    }
                }
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Training failed");
                self.finish(&run_id, Err(e.to_string()));
            }
        }
    }

    /// Apply the terminal transition and persist the final record.
    fn finish(&self, run_id: &str, result: std::result::Result<PathBuf, String>) {
        self.transition(run_id, |record| match result {
            Ok(path) => {
                record.state = RunState::Completed;
                record.final_artifact_path = Some(path);
            }
            Err(error) => {
                record.state = RunState::Failed;
                record.error = Some(error);
            }
        });
    }

    /// Mutate a record under the write lock and persist the new snapshot.
    fn transition(&self, run_id: &str, apply: impl FnOnce(&mut RunRecord)) {
        let snapshot = {
            let mut registry = self.registry.write().unwrap();
            let Some(record) = registry.get_mut(run_id) else {
                tracing::error!(run_id = %run_id, "Transition on unknown run");
                return;
            };
            apply(record);
            record.touch();
            record.clone()
        };
        self.persist(&snapshot);
    }

    /// Best-effort durable write; failures are logged, never fatal.
    fn persist(&self, record: &RunRecord) {
        if let Err(e) = self.run_state.put(record) {
            tracing::warn!(run_id = %record.run_id, error = %e, "Run state write failed");
        }
    }
}
