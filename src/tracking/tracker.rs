//! Experiment tracker implementation
//!
//! Track runs, their parameters, metrics and artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use parking_lot::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::storage::{LocalStorage, StorageBackend};
use crate::error::{MushroomError, Result, Stage};

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// One tracked run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the run is active
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Paths of stored artifacts
    pub artifacts: Vec<String>,
}

impl Run {
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            run_name: run_name.into(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// Experiment tracker: one active run at a time, persisted when it ends
pub struct ExperimentTracker {
    storage: Box<dyn StorageBackend>,
    current_run: RwLock<Option<Run>>,
}

impl ExperimentTracker {
    /// Tracker writing to `runs.json` under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_storage(Box::new(LocalStorage::new(dir)))
    }

    pub fn with_storage(storage: Box<dyn StorageBackend>) -> Self {
        Self {
            storage,
            current_run: RwLock::new(None),
        }
    }

    /// Start a new run, replacing any run that was never ended
    pub fn start_run(&self, run_name: impl Into<String>) -> Result<String> {
        if !self.storage.is_available() {
            return Err(MushroomError::Config("tracking storage is not available".to_string()));
        }
        let run = Run::new(run_name);
        let run_id = run.run_id.clone();
        debug!(run_id = %run_id, run_name = %run.run_name, "Tracking run started");
        *self.current_run.write() = Some(run);
        Ok(run_id)
    }

    pub fn log_param(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.with_active_run(|run| {
            run.params.insert(key.into(), value.into());
            Ok(())
        })
    }

    pub fn log_metric(&self, name: impl Into<String>, value: f64) -> Result<()> {
        self.with_active_run(|run| {
            run.metrics.insert(name.into(), value);
            Ok(())
        })
    }

    /// Store a copy of `object` as JSON inside the run's directory
    pub fn log_artifact<T: Serialize>(&self, file_name: &str, object: &T) -> Result<PathBuf> {
        let contents = serde_json::to_vec_pretty(object).map_err(|e| MushroomError::CorruptArtifact {
            stage: Stage::Tracking,
            path: PathBuf::from(file_name),
            cause: e.to_string(),
        })?;
        self.with_active_run(|run| {
            let path = self.storage.store_artifact(&run.run_id, file_name, &contents)?;
            run.artifacts.push(path.display().to_string());
            Ok(path)
        })
    }

    /// Close the active run and append it to storage
    pub fn end_run(&self, status: RunStatus) -> Result<Run> {
        let mut run = self
            .current_run
            .write()
            .take()
            .ok_or_else(|| MushroomError::Config("no active tracking run".to_string()))?;
        run.end_time = Some(Utc::now());
        run.status = status;

        let mut runs = self.storage.load_runs()?;
        runs.push(run.clone());
        self.storage.save_runs(&runs)?;

        debug!(run_id = %run.run_id, status = ?run.status, "Tracking run ended");
        Ok(run)
    }

    pub fn current_run(&self) -> Option<Run> {
        self.current_run.read().clone()
    }

    /// Every run persisted so far
    pub fn runs(&self) -> Result<Vec<Run>> {
        self.storage.load_runs()
    }

    fn with_active_run<T>(&self, f: impl FnOnce(&mut Run) -> Result<T>) -> Result<T> {
        let mut guard = self.current_run.write();
        let run = guard
            .as_mut()
            .ok_or_else(|| MushroomError::Config("no active tracking run".to_string()))?;
        f(run)
    }
}

impl std::fmt::Debug for ExperimentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentTracker")
            .field("current_run", &self.current_run())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::new(dir.path());

        let run_id = tracker.start_run("model_selection").unwrap();
        tracker.log_param("best_model", "Random Forest Classifier").unwrap();
        tracker.log_metric("accuracy_score", 0.98).unwrap();
        let artifact = tracker.log_artifact("model.json", &vec![1, 2, 3]).unwrap();
        assert!(artifact.starts_with(dir.path().join(&run_id)));

        let run = tracker.end_run(RunStatus::Finished).unwrap();
        assert_eq!(run.run_id, run_id);
        assert!(run.end_time.is_some());
        assert!(tracker.current_run().is_none());

        let runs = tracker.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].params["best_model"], "Random Forest Classifier");
        assert_eq!(runs[0].metrics["accuracy_score"], 0.98);
        assert_eq!(runs[0].artifacts.len(), 1);
    }

    #[test]
    fn test_runs_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::new(dir.path());
        for name in ["first", "second"] {
            tracker.start_run(name).unwrap();
            tracker.end_run(RunStatus::Finished).unwrap();
        }
        let names: Vec<String> = tracker.runs().unwrap().into_iter().map(|r| r.run_name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_logging_without_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::new(dir.path());
        assert!(tracker.log_metric("accuracy_score", 1.0).is_err());
        assert!(tracker.end_run(RunStatus::Failed).is_err());
    }
}
