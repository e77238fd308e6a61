//! Mushroom classifier
//!
//! Trains a binary edible/poisonous classifier on seven categorical
//! attributes of the UCI mushroom dataset and serves predictions from the
//! persisted artifacts.
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`ingestion`] - Seeded train/test split of the source CSV
//! - [`transformation`] - Feature and label encoding, encoder persistence
//! - [`training`] - Candidate families, grid search and model selection
//! - [`pipeline`] - Fail-fast orchestration of the stages above
//! - [`inference`] - Single-record prediction from persisted artifacts
//!
//! ## Supporting modules
//! - [`artifact`] - JSON artifact store
//! - [`preprocessing`] - One-hot encoding and scaling
//! - [`tracking`] - Experiment tracking side channel
//! - [`config`] - Pipeline configuration
//!
//! ## Services
//! - [`server`] - HTTP form and JSON prediction endpoints
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;
pub mod artifact;

// Pipeline stages
pub mod preprocessing;
pub mod ingestion;
pub mod transformation;
pub mod training;
pub mod pipeline;
pub mod inference;

// Side channels
pub mod tracking;

// Services
pub mod server;
pub mod cli;

pub use error::{MushroomError, Result, Stage};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{MushroomError, Result, Stage};
    pub use crate::config::{PipelineConfig, FEATURE_COLUMNS, TARGET_COLUMN};

    // Stages
    pub use crate::ingestion::{DataIngestion, IngestionArtifact};
    pub use crate::transformation::{DataTransformation, TransformationArtifact};
    pub use crate::pipeline::{ResultSummary, TrainingPipeline};

    // Encoding
    pub use crate::preprocessing::{FeatureEncoder, LabelEncoder};

    // Training
    pub use crate::training::{
        CandidateSet, GridSearchCV, ModelArtifact, ModelFamily, ModelSelector, ParamGrid,
    };

    // Inference
    pub use crate::inference::{predict_once, MushroomRecord, Prediction, PredictionService};

    // Tracking
    pub use crate::tracking::{ExperimentTracker, Run, RunStatus};
}
