//! Training pipeline
//!
//! Runs ingestion, transformation and model selection in order. The first
//! failing stage aborts the run and its error is returned unchanged.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ndarray::{Array1, Array2};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingestion::DataIngestion;
use crate::tracking::ExperimentTracker;
use crate::training::{CandidateSet, EvaluationReport, ModelArtifact, ModelSelector};
use crate::transformation::DataTransformation;

/// Everything a finished training run produced
#[derive(Debug, Clone)]
pub struct ResultSummary {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
    pub encoder_path: PathBuf,
    pub model_path: PathBuf,
    pub model: ModelArtifact,
    /// Candidate name of the winning family
    pub family: String,
    /// Held-out accuracy of the winner
    pub accuracy: f64,
    pub report: EvaluationReport,
    pub total_time_secs: f64,
}

/// End-to-end training run
pub struct TrainingPipeline {
    config: PipelineConfig,
    candidates: Option<CandidateSet>,
    tracker: Option<ExperimentTracker>,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            candidates: None,
            tracker: None,
        }
    }

    /// Search these candidates instead of the configured grids
    pub fn with_candidates(mut self, candidates: CandidateSet) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Record the winning model in an experiment tracker
    pub fn with_tracker(mut self, tracker: ExperimentTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, source_path: impl AsRef<Path>) -> Result<ResultSummary> {
        let start = Instant::now();
        self.config.validate()?;

        let candidates = match &self.candidates {
            Some(candidates) => candidates.clone(),
            None => CandidateSet::load(&self.config)?,
        };

        let ingestion = DataIngestion::new(&self.config).ingest(source_path)?;
        let transformed =
            DataTransformation::new(&self.config).transform(&ingestion.train_path, &ingestion.test_path)?;

        // A configured tracking directory stands in for an explicit tracker
        let configured_tracker = match (&self.tracker, &self.config.tracking_dir) {
            (None, Some(dir)) => Some(ExperimentTracker::new(dir.clone())),
            _ => None,
        };

        let mut selector =
            ModelSelector::new(&self.config).with_encoder_fingerprint(transformed.encoder_fingerprint.as_str());
        if let Some(tracker) = self.tracker.as_ref().or(configured_tracker.as_ref()) {
            selector = selector.with_tracker(tracker);
        }
        let outcome = selector.select_best(
            &transformed.x_train,
            &transformed.y_train,
            &transformed.x_test,
            &transformed.y_test,
            &candidates,
        )?;

        let total_time_secs = start.elapsed().as_secs_f64();
        info!(
            family = %outcome.family,
            accuracy = outcome.accuracy,
            seconds = total_time_secs,
            "Training pipeline finished"
        );

        Ok(ResultSummary {
            x_train: transformed.x_train,
            y_train: transformed.y_train,
            x_test: transformed.x_test,
            y_test: transformed.y_test,
            encoder_path: transformed.encoder_path,
            model_path: self.config.model_path.clone(),
            model: outcome.model,
            family: outcome.family,
            accuracy: outcome.accuracy,
            report: outcome.report,
            total_time_secs,
        })
    }
}
