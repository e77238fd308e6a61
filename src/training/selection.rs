//! Model selection
//!
//! Grid-searches every candidate family on the training partition, scores the
//! refit winner of each family on the held-out partition and persists the
//! overall best model.

use chrono::Utc;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::classifier::{ModelArtifact, ModelFamily};
use super::cross_validation::CrossValidator;
use super::grid::{format_params, Candidate, CandidateSet, ParamSet};
use super::grid_search::GridSearchCV;
use super::models::{accuracy_score, ModelMetrics};
use crate::artifact;
use crate::config::PipelineConfig;
use crate::error::{MushroomError, Result, Stage};
use crate::tracking::{ExperimentTracker, RunStatus};

/// Outcome of one family's search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyReport {
    pub name: String,
    pub family: ModelFamily,
    pub best_params: ParamSet,
    /// Mean cross-validated accuracy of the best combination
    pub cv_score: f64,
    /// Accuracy of the refit model on the training partition
    pub train_accuracy: f64,
    /// Held-out accuracy, the selection criterion
    pub test_accuracy: f64,
    pub test_metrics: ModelMetrics,
    pub combinations: usize,
    pub duration_secs: f64,
}

/// Per-family results in candidate order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub entries: Vec<FamilyReport>,
    /// Families whose search failed, with the reason
    pub skipped: Vec<(String, String)>,
}

impl EvaluationReport {
    /// Highest test accuracy; the earliest entry wins ties
    pub fn best(&self) -> Option<&FamilyReport> {
        self.entries.iter().fold(None, |best: Option<&FamilyReport>, entry| match best {
            Some(b) if b.test_accuracy >= entry.test_accuracy => Some(b),
            _ => Some(entry),
        })
    }

    pub fn get(&self, name: &str) -> Option<&FamilyReport> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The persisted winner plus the full report
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Held-out accuracy of the winner
    pub accuracy: f64,
    pub model: ModelArtifact,
    /// Candidate name of the winner
    pub family: String,
    pub params: ParamSet,
    pub report: EvaluationReport,
}

/// Model selection stage
pub struct ModelSelector<'a> {
    config: &'a PipelineConfig,
    tracker: Option<&'a ExperimentTracker>,
    encoder_fingerprint: String,
}

impl<'a> ModelSelector<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            tracker: None,
            encoder_fingerprint: String::new(),
        }
    }

    /// Record the winner in an experiment tracker
    pub fn with_tracker(mut self, tracker: &'a ExperimentTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Fingerprint of the encoder that produced the feature matrices; stored
    /// in the model envelope
    pub fn with_encoder_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.encoder_fingerprint = fingerprint.into();
        self
    }

    pub fn select_best(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
        candidates: &CandidateSet,
    ) -> Result<SelectionOutcome> {
        info!(
            candidates = candidates.len(),
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            folds = self.config.cv_folds,
            "Entered model selection"
        );

        let mut report = EvaluationReport::default();
        let mut winner: Option<(usize, ModelArtifact)> = None;

        for candidate in candidates {
            match self.evaluate(candidate, x_train, y_train, x_test, y_test) {
                Ok((entry, artifact)) => {
                    info!(
                        family = %entry.name,
                        train_accuracy = entry.train_accuracy,
                        test_accuracy = entry.test_accuracy,
                        cv_score = entry.cv_score,
                        params = %format_params(&entry.best_params),
                        "Family evaluated"
                    );
                    let improves = match &winner {
                        Some((idx, _)) => entry.test_accuracy > report.entries[*idx].test_accuracy,
                        None => true,
                    };
                    if improves {
                        winner = Some((report.entries.len(), artifact));
                    }
                    report.entries.push(entry);
                }
                Err(e) => {
                    warn!(family = %candidate.name, error = %e, "Skipping family");
                    report.skipped.push((candidate.name.clone(), e.to_string()));
                }
            }
        }
        info!("Model hyperparameter tuning done");

        let floor = self.config.accuracy_floor;
        let Some((best_idx, model)) = winner else {
            return Err(MushroomError::NoAcceptableModel {
                stage: Stage::ModelSelection,
                best: 0.0,
                floor,
            });
        };

        let best = &report.entries[best_idx];
        let (accuracy, family, params) = (best.test_accuracy, best.name.clone(), best.best_params.clone());
        if accuracy < floor {
            return Err(MushroomError::NoAcceptableModel {
                stage: Stage::ModelSelection,
                best: accuracy,
                floor,
            });
        }
        info!(family = %family, accuracy, "Best model found");

        artifact::save(&self.config.model_path, &model)?;
        info!(path = %self.config.model_path.display(), "Saved model");

        if let Some(tracker) = self.tracker {
            if let Err(e) = record_run(tracker, &model) {
                warn!(error = %e, "Experiment tracking failed");
            }
        }

        Ok(SelectionOutcome {
            accuracy,
            family,
            params,
            model,
            report,
        })
    }

    fn evaluate(
        &self,
        candidate: &Candidate,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<(FamilyReport, ModelArtifact)> {
        let search = GridSearchCV::new(candidate.family, candidate.grid.clone())
            .with_cv(CrossValidator::stratified(self.config.cv_folds))
            .with_random_state(self.config.seed)
            .fit(x_train, y_train)?;

        let train_accuracy = accuracy_score(y_train, &search.best_model.predict(x_train)?);
        let test_predictions = search.best_model.predict(x_test)?;
        let test_metrics = ModelMetrics::compute_classification(y_test, &test_predictions);

        let entry = FamilyReport {
            name: candidate.name.clone(),
            family: candidate.family,
            best_params: search.best_params().clone(),
            cv_score: search.best_score(),
            train_accuracy,
            test_accuracy: test_metrics.accuracy,
            test_metrics,
            combinations: search.trials.len(),
            duration_secs: search.duration_secs,
        };
        let artifact = ModelArtifact {
            name: candidate.name.clone(),
            family: candidate.family,
            params: entry.best_params.clone(),
            accuracy: entry.test_accuracy,
            encoder_fingerprint: self.encoder_fingerprint.clone(),
            n_features: x_train.ncols(),
            trained_at: Utc::now(),
            model: search.best_model,
        };
        Ok((entry, artifact))
    }
}

fn record_run(tracker: &ExperimentTracker, model: &ModelArtifact) -> Result<()> {
    tracker.start_run("model_selection")?;
    tracker.log_param("best_model", model.name.as_str())?;
    for (name, value) in &model.params {
        tracker.log_param(format!("param.{}", name), value.to_string())?;
    }
    tracker.log_metric("accuracy_score", model.accuracy)?;
    tracker.log_artifact("model.json", model)?;
    tracker.end_run(RunStatus::Finished)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::grid::{ParamGrid, ParameterValue};

    /// Feature 0 decides the label, feature 1 is noise
    fn make_data(n: usize, offset: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let i = i + offset;
            if j == 0 {
                (i % 2) as f64
            } else {
                ((i * 7) % 5) as f64
            }
        });
        let y = Array1::from_shape_fn(n, |i| ((i + offset) % 2) as f64);
        (x, y)
    }

    fn candidate(name: &str, family: ModelFamily, grid: ParamGrid) -> Candidate {
        Candidate {
            name: name.to_string(),
            family,
            grid,
        }
    }

    fn test_config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig::with_artifacts_dir(dir)
    }

    #[test]
    fn test_selects_best_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let (x_train, y_train) = make_data(30, 0);
        let (x_test, y_test) = make_data(10, 30);

        // A depth-0 forest cannot split, so it scores at chance
        let candidates = CandidateSet::new(vec![
            candidate(
                "Stump Forest",
                ModelFamily::RandomForest,
                ParamGrid::new().with_param("max_depth", vec![ParameterValue::Int(0)]),
            ),
            candidate("Decision Tree", ModelFamily::DecisionTree, ParamGrid::new()),
            candidate("Logistic Regression", ModelFamily::LogisticRegression, ParamGrid::new()),
        ]);

        let outcome = ModelSelector::new(&config)
            .with_encoder_fingerprint("fp")
            .select_best(&x_train, &y_train, &x_test, &y_test, &candidates)
            .unwrap();

        assert_eq!(outcome.report.len(), 3);
        assert_eq!(outcome.family, "Decision Tree");
        assert!((outcome.accuracy - 1.0).abs() < 1e-12);
        let max = outcome
            .report
            .entries
            .iter()
            .map(|e| e.test_accuracy)
            .fold(f64::MIN, f64::max);
        assert_eq!(outcome.accuracy, max);

        let stored: ModelArtifact = artifact::load(&config.model_path).unwrap();
        assert_eq!(stored.name, "Decision Tree");
        assert_eq!(stored.encoder_fingerprint, "fp");
        assert_eq!(stored.predict(&x_test).unwrap(), y_test);
    }

    #[test]
    fn test_below_floor_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).with_accuracy_floor(0.99);
        let (x_train, y_train) = make_data(30, 0);
        let (x_test, y_test) = make_data(10, 30);

        let candidates = CandidateSet::new(vec![candidate(
            "Stump Forest",
            ModelFamily::RandomForest,
            ParamGrid::new().with_param("max_depth", vec![ParameterValue::Int(0)]),
        )]);

        let err = ModelSelector::new(&config)
            .select_best(&x_train, &y_train, &x_test, &y_test, &candidates)
            .unwrap_err();
        assert!(matches!(err, MushroomError::NoAcceptableModel { floor, .. } if floor == 0.99));
        assert!(!config.model_path.exists());
    }

    #[test]
    fn test_failing_family_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let (x_train, y_train) = make_data(30, 0);
        let (x_test, y_test) = make_data(10, 30);

        let candidates = CandidateSet::new(vec![
            candidate(
                "Ada Boost Classifier",
                ModelFamily::AdaBoost,
                ParamGrid::new().with_param("algorithm", vec![ParameterValue::String("SAMME.R".into())]),
            ),
            candidate("Decision Tree", ModelFamily::DecisionTree, ParamGrid::new()),
        ]);

        let outcome = ModelSelector::new(&config)
            .select_best(&x_train, &y_train, &x_test, &y_test, &candidates)
            .unwrap();
        assert_eq!(outcome.report.skipped.len(), 1);
        assert_eq!(outcome.report.skipped[0].0, "Ada Boost Classifier");
        assert_eq!(outcome.family, "Decision Tree");
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let (x_train, y_train) = make_data(30, 0);
        let (x_test, y_test) = make_data(10, 30);

        let candidates = CandidateSet::new(vec![
            candidate("Decision Tree", ModelFamily::DecisionTree, ParamGrid::new()),
            candidate("Deep Tree", ModelFamily::DecisionTree, ParamGrid::new()),
        ]);
        let outcome = ModelSelector::new(&config)
            .select_best(&x_train, &y_train, &x_test, &y_test, &candidates)
            .unwrap();
        assert_eq!(outcome.family, "Decision Tree");
        assert_eq!(outcome.report.best().unwrap().name, "Decision Tree");
    }

    #[test]
    fn test_tracker_records_winner() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let tracker = ExperimentTracker::new(dir.path().join("mlruns"));
        let (x_train, y_train) = make_data(30, 0);
        let (x_test, y_test) = make_data(10, 30);

        let candidates =
            CandidateSet::new(vec![candidate("Decision Tree", ModelFamily::DecisionTree, ParamGrid::new())]);
        ModelSelector::new(&config)
            .with_tracker(&tracker)
            .select_best(&x_train, &y_train, &x_test, &y_test, &candidates)
            .unwrap();

        let runs = tracker.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].params["best_model"], "Decision Tree");
        assert_eq!(runs[0].metrics["accuracy_score"], 1.0);
        assert_eq!(runs[0].artifacts.len(), 1);
    }
}
