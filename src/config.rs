//! Pipeline configuration
//!
//! Every stage receives a [`PipelineConfig`] instead of reading process-wide
//! constants. Defaults lay artifacts out under `artifacts/`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MushroomError, Result, Stage};

/// Target column of the dataset
pub const TARGET_COLUMN: &str = "class";

/// Feature columns, in encoding order
pub const FEATURE_COLUMNS: [&str; 7] = [
    "bruises",
    "gill-spacing",
    "gill-size",
    "gill-color",
    "stalk-root",
    "ring-type",
    "spore-print-color",
];

/// Configuration shared by all pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Unmodified copy of the source dataset
    pub raw_path: PathBuf,
    /// Training partition
    pub train_path: PathBuf,
    /// Held-out partition
    pub test_path: PathBuf,
    /// Fitted feature encoder
    pub encoder_path: PathBuf,
    /// Winning model envelope
    pub model_path: PathBuf,
    /// Seed for the train/test split and model randomness
    pub seed: u64,
    /// Fraction of rows assigned to the test partition
    pub test_size: f64,
    /// Folds used by the grid search
    pub cv_folds: usize,
    /// Minimum held-out accuracy for a model to be persisted
    pub accuracy_floor: f64,
    /// External hyperparameter grid file (built-in grids when absent)
    pub grids_path: Option<PathBuf>,
    /// Experiment tracking directory (tracking disabled when absent)
    pub tracking_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_artifacts_dir("artifacts")
    }
}

impl PipelineConfig {
    /// Default layout rooted at `dir`
    pub fn with_artifacts_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let ingestion = dir.join("data_ingestion");
        Self {
            raw_path: ingestion.join("raw").join("raw_data.csv"),
            train_path: ingestion.join("feature_store").join("train.csv"),
            test_path: ingestion.join("feature_store").join("test.csv"),
            encoder_path: dir.join("data_transformation").join("preprocessor.json"),
            model_path: dir.join("model_trainer").join("model.json"),
            seed: 42,
            test_size: 0.25,
            cv_folds: 3,
            accuracy_floor: 0.6,
            grids_path: None,
            tracking_dir: None,
        }
    }

    /// Defaults overridden by `MUSHROOM_*` environment variables
    pub fn from_env() -> Self {
        let mut config = match std::env::var("MUSHROOM_ARTIFACTS_DIR") {
            Ok(dir) => Self::with_artifacts_dir(dir),
            Err(_) => Self::default(),
        };

        if let Some(seed) = std::env::var("MUSHROOM_SEED").ok().and_then(|s| s.parse().ok()) {
            config.seed = seed;
        }
        if let Some(folds) = std::env::var("MUSHROOM_CV_FOLDS").ok().and_then(|s| s.parse().ok()) {
            config.cv_folds = folds;
        }
        if let Some(floor) = std::env::var("MUSHROOM_ACCURACY_FLOOR").ok().and_then(|s| s.parse().ok()) {
            config.accuracy_floor = floor;
        }
        if let Ok(path) = std::env::var("MUSHROOM_GRIDS") {
            config.grids_path = Some(PathBuf::from(path));
        }
        if let Ok(dir) = std::env::var("MUSHROOM_TRACKING_DIR") {
            config.tracking_dir = Some(PathBuf::from(dir));
        }

        config
    }

    /// Load a JSON configuration file; omitted fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MushroomError::io(Stage::Config, path, e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| MushroomError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_accuracy_floor(mut self, floor: f64) -> Self {
        self.accuracy_floor = floor;
        self
    }

    pub fn with_grids_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.grids_path = Some(path.into());
        self
    }

    pub fn with_tracking_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = Some(dir.into());
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(MushroomError::Config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(MushroomError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if !(0.0..=1.0).contains(&self.accuracy_floor) {
            return Err(MushroomError::Config(format!(
                "accuracy_floor must be in [0, 1], got {}",
                self.accuracy_floor
            )));
        }
        Ok(())
    }
}
