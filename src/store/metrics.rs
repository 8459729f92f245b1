//! Append-only metrics sinks
//!
//! Per-epoch metrics are written as an append-only log keyed by
//! `(run_id, epoch)` with no uniqueness constraint: duplicate appends from
//! retries are stored as-is. Two backends, selected via configuration: SQLite
//! and a JSON-lines file.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, params};

use crate::domain::MetricRecord;
use crate::error::{Result, TrainrError};

/// Durable, concurrent-safe append of per-epoch metric records.
pub trait MetricsSink: Send + Sync {
    /// Store one record for `(run_id, epoch)`.
    fn append(&self, run_id: &str, epoch: u32, metrics: &HashMap<String, f64>) -> Result<()>;
}

/// SQLite-backed metrics sink.
///
/// Plain inserts into an autoincrement table; no uniqueness constraint on
/// `(run_id, epoch)`.
pub struct SqliteMetricsSink {
    db: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteMetricsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMetricsSink").finish_non_exhaustive()
    }
}

impl SqliteMetricsSink {
    /// Open or create the sink at the given database path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Connection::open(path).map_err(|e| TrainrError::Persistence(e.to_string()))?;
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                epoch INTEGER NOT NULL,
                metrics TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_metrics_run ON metrics(run_id);
            "#,
        )
        .map_err(|e| TrainrError::Persistence(e.to_string()))?;

        Ok(Self { db: Mutex::new(db) })
    }

    /// Read back every record for a run, in append order.
    pub fn for_run(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        let db = self.db.lock().map_err(|e| TrainrError::Persistence(e.to_string()))?;
        let mut stmt = db
            .prepare("SELECT run_id, epoch, metrics, recorded_at FROM metrics WHERE run_id = ?1 ORDER BY id")
            .map_err(|e| TrainrError::Persistence(e.to_string()))?;

        let rows = stmt
            .query_map([run_id], |row| {
                let run_id: String = row.get(0)?;
                let epoch: u32 = row.get(1)?;
                let metrics: String = row.get(2)?;
                let recorded_at: String = row.get(3)?;
                Ok((run_id, epoch, metrics, recorded_at))
            })
            .map_err(|e| TrainrError::Persistence(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (run_id, epoch, metrics, recorded_at) =
                row.map_err(|e| TrainrError::Persistence(e.to_string()))?;
            records.push(MetricRecord {
                run_id,
                epoch,
                metrics: serde_json::from_str(&metrics)?,
                recorded_at: recorded_at
                    .parse()
                    .map_err(|e| TrainrError::Persistence(format!("bad timestamp: {}", e)))?,
            });
        }
        Ok(records)
    }
}

impl MetricsSink for SqliteMetricsSink {
    fn append(&self, run_id: &str, epoch: u32, metrics: &HashMap<String, f64>) -> Result<()> {
        let record = MetricRecord::new(run_id, epoch, metrics.clone());
        let db = self.db.lock().map_err(|e| TrainrError::Persistence(e.to_string()))?;
        db.execute(
            "INSERT INTO metrics (run_id, epoch, metrics, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.run_id,
                record.epoch,
                serde_json::to_string(&record.metrics)?,
                record.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| TrainrError::Persistence(e.to_string()))?;
        Ok(())
    }
}

/// JSON-lines metrics sink.
///
/// Each record is one JSON object on its own line, appended under a lock so
/// concurrent jobs never interleave partial lines.
#[derive(Debug)]
pub struct JsonlMetricsSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlMetricsSink {
    /// Create a sink appending to the given file, creating parent dirs.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Read back every record for a run, in append order.
    pub fn for_run(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: MetricRecord = serde_json::from_str(line)?;
            if record.run_id == run_id {
                records.push(record);
            }
        }
        Ok(records)
    }
}

impl MetricsSink for JsonlMetricsSink {
    fn append(&self, run_id: &str, epoch: u32, metrics: &HashMap<String, f64>) -> Result<()> {
        let record = MetricRecord::new(run_id, epoch, metrics.clone());
        let line = serde_json::to_string(&record)?;

        let _guard = self.write_lock.lock().map_err(|e| TrainrError::Persistence(e.to_string()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_metrics(loss: f64, map: f64) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert("loss".to_string(), loss);
        m.insert("mAP".to_string(), map);
        m
    }

    #[test]
    fn test_sqlite_append_and_read_back() {
        let temp = TempDir::new().unwrap();
        let sink = SqliteMetricsSink::open(temp.path().join("metrics.db")).unwrap();

        sink.append("run-1", 1, &sample_metrics(0.9, 0.1)).unwrap();
        sink.append("run-1", 2, &sample_metrics(0.5, 0.4)).unwrap();
        sink.append("run-2", 1, &sample_metrics(0.8, 0.2)).unwrap();

        let records = sink.for_run("run-1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].epoch, 1);
        assert_eq!(records[0].metrics["loss"], 0.9);
        assert_eq!(records[1].epoch, 2);
        assert_eq!(records[1].metrics["mAP"], 0.4);
    }

    #[test]
    fn test_sqlite_duplicate_appends_kept() {
        let temp = TempDir::new().unwrap();
        let sink = SqliteMetricsSink::open(temp.path().join("metrics.db")).unwrap();

        sink.append("run-1", 1, &sample_metrics(0.9, 0.1)).unwrap();
        sink.append("run-1", 1, &sample_metrics(0.9, 0.1)).unwrap();

        assert_eq!(sink.for_run("run-1").unwrap().len(), 2);
    }

    #[test]
    fn test_sqlite_concurrent_appends_not_lost() {
        let temp = TempDir::new().unwrap();
        let sink = Arc::new(SqliteMetricsSink::open(temp.path().join("metrics.db")).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|job| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for epoch in 1..=25u32 {
                        sink.append(&format!("run-{}", job), epoch, &sample_metrics(0.5, 0.5))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for job in 0..4 {
            assert_eq!(sink.for_run(&format!("run-{}", job)).unwrap().len(), 25);
        }
    }

    #[test]
    fn test_sqlite_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("metrics.db");

        {
            let sink = SqliteMetricsSink::open(&db_path).unwrap();
            sink.append("run-1", 1, &sample_metrics(0.9, 0.1)).unwrap();
        }
        {
            let sink = SqliteMetricsSink::open(&db_path).unwrap();
            assert_eq!(sink.for_run("run-1").unwrap().len(), 1);
        }
    }

    #[test]
    fn test_jsonl_append_and_read_back() {
        let temp = TempDir::new().unwrap();
        let sink = JsonlMetricsSink::open(temp.path().join("metrics.jsonl")).unwrap();

        sink.append("run-1", 1, &sample_metrics(0.9, 0.1)).unwrap();
        sink.append("run-2", 1, &sample_metrics(0.8, 0.2)).unwrap();
        sink.append("run-1", 2, &sample_metrics(0.5, 0.4)).unwrap();

        let records = sink.for_run("run-1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].epoch, 1);
        assert_eq!(records[1].epoch, 2);
    }

    #[test]
    fn test_jsonl_for_run_missing_file() {
        let temp = TempDir::new().unwrap();
        let sink = JsonlMetricsSink::open(temp.path().join("metrics.jsonl")).unwrap();
        assert!(sink.for_run("run-1").unwrap().is_empty());
    }

    #[test]
    fn test_jsonl_lines_are_valid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("metrics.jsonl");
        let sink = JsonlMetricsSink::open(&path).unwrap();

        sink.append("run-1", 1, &sample_metrics(0.9, 0.1)).unwrap();
        sink.append("run-1", 2, &sample_metrics(0.5, 0.4)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        for line in content.lines() {
            serde_json::from_str::<serde_json::Value>(line).expect("each line parses alone");
        }
    }

    #[test]
    fn test_jsonl_concurrent_appends_not_lost() {
        let temp = TempDir::new().unwrap();
        let sink = Arc::new(JsonlMetricsSink::open(temp.path().join("metrics.jsonl")).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|job| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for epoch in 1..=25u32 {
                        sink.append(&format!("run-{}", job), epoch, &sample_metrics(0.5, 0.5))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for job in 0..4 {
            assert_eq!(sink.for_run(&format!("run-{}", job)).unwrap().len(), 25);
        }
    }
}
