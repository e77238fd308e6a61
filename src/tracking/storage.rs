//! Storage backend for experiment tracking
//!
//! Runs are kept in a single `runs.json` file; artifacts logged for a run are
//! written to a directory named after the run id.

use std::fs;
use std::path::{Path, PathBuf};

use super::tracker::Run;
use crate::error::{MushroomError, Result, Stage};

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    /// Replace the stored run list
    fn save_runs(&self, runs: &[Run]) -> Result<()>;

    /// All stored runs, oldest first
    fn load_runs(&self) -> Result<Vec<Run>>;

    /// Store an artifact file for a run and return where it was written
    fn store_artifact(&self, run_id: &str, file_name: &str, contents: &[u8]) -> Result<PathBuf>;

    /// Check if storage is available
    fn is_available(&self) -> bool;
}

/// Local file system storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn runs_file(&self) -> PathBuf {
        self.base_dir.join("runs.json")
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(run_id)
    }
}

impl StorageBackend for LocalStorage {
    fn save_runs(&self, runs: &[Run]) -> Result<()> {
        fs::create_dir_all(&self.base_dir).map_err(|e| MushroomError::io(Stage::Tracking, &self.base_dir, e))?;

        let path = self.runs_file();
        let json = serde_json::to_string_pretty(runs).map_err(|e| MushroomError::CorruptArtifact {
            stage: Stage::Tracking,
            path: path.clone(),
            cause: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| MushroomError::io(Stage::Tracking, &path, e))
    }

    fn load_runs(&self) -> Result<Vec<Run>> {
        let path = self.runs_file();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&path).map_err(|e| MushroomError::io(Stage::Tracking, &path, e))?;
        serde_json::from_str(&contents).map_err(|e| MushroomError::CorruptArtifact {
            stage: Stage::Tracking,
            path,
            cause: e.to_string(),
        })
    }

    fn store_artifact(&self, run_id: &str, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir).map_err(|e| MushroomError::io(Stage::Tracking, &dir, e))?;

        let path = dir.join(file_name);
        fs::write(&path, contents).map_err(|e| MushroomError::io(Stage::Tracking, &path, e))?;
        Ok(path)
    }

    fn is_available(&self) -> bool {
        fs::create_dir_all(&self.base_dir).is_ok()
    }
}
