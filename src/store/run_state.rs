//! Durable run-state store
//!
//! Run records are upserted by `run_id` (last write wins) and bulk-loaded
//! once at manager startup so in-flight and finished runs survive a process
//! restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};

use crate::domain::RunRecord;
use crate::error::{Result, TrainrError};

/// Durable key-value store of run records.
pub trait RunStateStore: Send + Sync {
    /// Upsert a record; replace-on-conflict by `run_id`.
    fn put(&self, record: &RunRecord) -> Result<()>;

    /// Load every stored record, keyed by `run_id`.
    fn load_all(&self) -> Result<HashMap<String, RunRecord>>;
}

/// SQLite-backed run-state store.
///
/// One row per run: the record is serialized whole into a JSON column, with
/// `INSERT OR REPLACE` giving row-level last-write-wins semantics. The
/// connection sits behind a `Mutex` because rusqlite's `Connection` is not
/// `Sync`.
pub struct SqliteRunStateStore {
    db: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteRunStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRunStateStore").finish_non_exhaustive()
    }
}

impl SqliteRunStateStore {
    /// Open or create the store at the given database path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Connection::open(path).map_err(|e| TrainrError::Persistence(e.to_string()))?;
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| TrainrError::Persistence(e.to_string()))?;

        Ok(Self { db: Mutex::new(db) })
    }
}

impl RunStateStore for SqliteRunStateStore {
    fn put(&self, record: &RunRecord) -> Result<()> {
        let data = serde_json::to_string(record)?;
        let db = self.db.lock().map_err(|e| TrainrError::Persistence(e.to_string()))?;
        db.execute(
            "INSERT OR REPLACE INTO runs (run_id, data, updated_at) VALUES (?1, ?2, ?3)",
            params![record.run_id, data, record.updated_at],
        )
        .map_err(|e| TrainrError::Persistence(e.to_string()))?;
        Ok(())
    }

    fn load_all(&self) -> Result<HashMap<String, RunRecord>> {
        let db = self.db.lock().map_err(|e| TrainrError::Persistence(e.to_string()))?;
        let mut stmt = db
            .prepare("SELECT run_id, data FROM runs")
            .map_err(|e| TrainrError::Persistence(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let run_id: String = row.get(0)?;
                let data: String = row.get(1)?;
                Ok((run_id, data))
            })
            .map_err(|e| TrainrError::Persistence(e.to_string()))?;

        let mut records = HashMap::new();
        for row in rows {
            let (run_id, data) = row.map_err(|e| TrainrError::Persistence(e.to_string()))?;
            match serde_json::from_str::<RunRecord>(&data) {
                Ok(record) => {
                    records.insert(run_id, record);
                }
                // A row that no longer parses is skipped, not fatal: one bad
                // record must not block recovery of the rest.
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "Skipping unparseable run record");
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunState;
    use tempfile::TempDir;

    fn create_temp_store() -> (SqliteRunStateStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteRunStateStore::open(temp_dir.path().join("runs.db")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/runs.db");
        let _store = SqliteRunStateStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_put_and_load_all() {
        let (store, _temp) = create_temp_store();

        let record = RunRecord::new("alice", "base", "ds", 3, "detector");
        store.put(&record).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&record.run_id], record);
    }

    #[test]
    fn test_put_replaces_by_run_id() {
        let (store, _temp) = create_temp_store();

        let mut record = RunRecord::new("alice", "base", "ds", 3, "detector");
        store.put(&record).unwrap();

        record.state = RunState::Completed;
        record.touch();
        store.put(&record).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&record.run_id].state, RunState::Completed);
    }

    #[test]
    fn test_load_all_empty() {
        let (store, _temp) = create_temp_store();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("runs.db");

        let records: Vec<RunRecord> = (0..5)
            .map(|i| RunRecord::new("alice", "base", "ds", i, &format!("run-{}", i)))
            .collect();

        {
            let store = SqliteRunStateStore::open(&db_path).unwrap();
            for record in &records {
                store.put(record).unwrap();
            }
        }

        {
            let store = SqliteRunStateStore::open(&db_path).unwrap();
            let loaded = store.load_all().unwrap();
            assert_eq!(loaded.len(), records.len());
            for record in &records {
                assert_eq!(&loaded[&record.run_id], record);
            }
        }
    }

    #[test]
    fn test_load_all_skips_unparseable_rows() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("runs.db");

        let store = SqliteRunStateStore::open(&db_path).unwrap();
        let record = RunRecord::new("alice", "base", "ds", 1, "good");
        store.put(&record).unwrap();

        {
            let db = store.db.lock().unwrap();
            db.execute(
                "INSERT INTO runs (run_id, data, updated_at) VALUES ('bad', 'not json', 0)",
                [],
            )
            .unwrap();
        }

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&record.run_id));
    }

    #[test]
    fn test_concurrent_puts() {
        let temp_dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(SqliteRunStateStore::open(temp_dir.path().join("runs.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    let record = RunRecord::new("alice", "base", "ds", i, &format!("run-{}", i));
                    store.put(&record).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load_all().unwrap().len(), 8);
    }
}
