//! Local-filesystem artifact storage
//!
//! Artifacts live under `root/{tenant_id}/models/` and are stored as
//! `{model_name}_{sequence}{ext}`, where the sequence comes from a strictly
//! increasing per-process counter so two saves of the same name in the same
//! instant never collide. Labels sit in a sibling `.labels` file, one label
//! per line.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::artifact::ArtifactStore;
use crate::domain::ModelMeta;
use crate::error::{Result, TrainrError};
use crate::id::next_artifact_seq;

/// Artifact store backed by a local directory tree.
#[derive(Debug)]
pub struct LocalFsArtifactStore {
    root: PathBuf,
}

impl LocalFsArtifactStore {
    /// Open or create a store rooted at the given directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Storage root for inspection and tests.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn models_dir(&self, tenant_id: &str) -> Result<PathBuf> {
        let dir = self.root.join(tenant_id).join("models");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Every artifact file in the tenant's directory, lexicographic order.
    fn artifact_files(&self, tenant_id: &str) -> Result<Vec<PathBuf>> {
        let dir = self.models_dir(tenant_id)?;
        let pattern = dir.join("*");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| TrainrError::Persistence(format!("non-UTF8 store path: {}", dir.display())))?;

        let mut files = Vec::new();
        for entry in glob::glob(pattern).map_err(|e| TrainrError::Persistence(e.to_string()))? {
            let path = entry.map_err(|e| TrainrError::Persistence(e.to_string()))?;
            if path.is_file() && path.extension().and_then(|ext| ext.to_str()) != Some("labels") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Matching artifacts for a model name, paired with their sequence.
    fn candidates(&self, tenant_id: &str, model_name: &str) -> Result<Vec<(u64, PathBuf)>> {
        let mut matches = Vec::new();
        for path in self.artifact_files(tenant_id)? {
            if let Some((name, seq)) = parse_stored_stem(&path)
                && name == model_name
            {
                matches.push((seq, path));
            }
        }
        Ok(matches)
    }
}

impl ArtifactStore for LocalFsArtifactStore {
    fn save(&self, tenant_id: &str, src_path: &Path, model_name: &str, labels: &[String]) -> Result<PathBuf> {
        let models_dir = self.models_dir(tenant_id)?;

        let ext = src_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".pt".to_string());
        let seq = next_artifact_seq();
        let dest_path = models_dir.join(format!("{}_{}{}", model_name, seq, ext));

        fs::copy(src_path, &dest_path)?;

        if !labels.is_empty() {
            let labels_path = labels_path_for(&dest_path);
            fs::write(&labels_path, labels.join("\n"))?;
        }

        tracing::info!(
            tenant_id = %tenant_id,
            model_name = %model_name,
            path = %dest_path.display(),
            "Artifact saved"
        );
        Ok(dest_path)
    }

    fn list(&self, tenant_id: &str) -> Result<Vec<ModelMeta>> {
        let mut metas = Vec::new();
        for path in self.artifact_files(tenant_id)? {
            let stem = match path.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };

            let labels_path = labels_path_for(&path);
            let labels = if labels_path.exists() {
                fs::read_to_string(&labels_path)?
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect()
            } else {
                Vec::new()
            };

            let created_at: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();
            metas.push(ModelMeta {
                model_name: stem,
                path,
                labels,
                created_at,
            });
        }
        Ok(metas)
    }

    fn get_path(&self, tenant_id: &str, model_name: &str) -> Result<PathBuf> {
        self.candidates(tenant_id, model_name)?
            .into_iter()
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, path)| path)
            .ok_or_else(|| TrainrError::NotFound(format!("model {} for tenant {}", model_name, tenant_id)))
    }

    fn delete(&self, tenant_id: &str, model_name: &str) -> Result<bool> {
        let candidates = self.candidates(tenant_id, model_name)?;
        if candidates.is_empty() {
            return Ok(false);
        }

        for (_, path) in candidates {
            fs::remove_file(&path)?;
            let labels_path = labels_path_for(&path);
            if labels_path.exists() {
                fs::remove_file(&labels_path)?;
            }
        }
        tracing::info!(tenant_id = %tenant_id, model_name = %model_name, "Artifact deleted");
        Ok(true)
    }
}

/// Sibling label file: `detector_17.pt` -> `detector_17.pt.labels`
fn labels_path_for(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".labels");
    PathBuf::from(name)
}

/// Split a stored file stem back into `(model_name, sequence)`.
///
/// Matching is exact on the final `_{digits}` segment, so `model` never
/// matches an artifact stored for `model2`.
fn parse_stored_stem(path: &Path) -> Option<(String, u64)> {
    let stem = path.file_stem()?.to_str()?;
    let (name, seq) = stem.rsplit_once('_')?;
    let seq: u64 = seq.parse().ok()?;
    Some((name.to_string(), seq))
}
