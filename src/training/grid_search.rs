//! Exhaustive grid search with k-fold cross-validation

use std::time::Instant;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::{ModelFamily, TrainedModel};
use super::cross_validation::{CVResults, CVSplit, CrossValidator};
use super::grid::{format_params, ParamGrid, ParamSet};
use super::models::accuracy_score;
use crate::error::{MushroomError, Result};

/// Cross-validated score of one grid combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridTrial {
    pub params: ParamSet,
    pub cv: CVResults,
}

/// Outcome of a grid search: every trial plus the best combination refit on
/// all of the training data.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub trials: Vec<GridTrial>,
    pub best_idx: usize,
    pub best_model: TrainedModel,
    pub duration_secs: f64,
}

impl GridSearchResult {
    pub fn best_trial(&self) -> &GridTrial {
        &self.trials[self.best_idx]
    }

    pub fn best_params(&self) -> &ParamSet {
        &self.best_trial().params
    }

    /// Mean CV accuracy of the best combination
    pub fn best_score(&self) -> f64 {
        self.best_trial().cv.mean_score
    }
}

/// Grid search over one model family, scored by mean fold accuracy
#[derive(Debug, Clone)]
pub struct GridSearchCV {
    family: ModelFamily,
    grid: ParamGrid,
    cv: CrossValidator,
    random_state: u64,
}

impl GridSearchCV {
    pub fn new(family: ModelFamily, grid: ParamGrid) -> Self {
        Self {
            family,
            grid,
            cv: CrossValidator::stratified(3),
            random_state: 42,
        }
    }

    pub fn with_cv(mut self, cv: CrossValidator) -> Self {
        self.cv = cv;
        self
    }

    /// Seed handed to every model the search builds
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Score every combination on every fold, then refit the winner. The
    /// first combination in grid order wins ties. Any failure aborts the
    /// whole search.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        if x.nrows() != y.len() {
            return Err(MushroomError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let start = Instant::now();
        let combinations = self.grid.combinations();
        if combinations.is_empty() {
            return Err(MushroomError::Config(format!("empty grid for {}", self.family)));
        }

        // Reject bad parameters before any fitting
        for params in &combinations {
            self.family.build(params, self.random_state)?;
        }

        let splits = self.cv.split(x.nrows(), y)?;
        let jobs: Vec<(usize, &CVSplit)> = (0..combinations.len())
            .flat_map(|combo_idx| splits.iter().map(move |split| (combo_idx, split)))
            .collect();

        let fold_scores: Vec<f64> = jobs
            .par_iter()
            .map(|&(combo_idx, split)| self.score_fold(&combinations[combo_idx], x, y, split))
            .collect::<Result<Vec<f64>>>()?;

        let trials: Vec<GridTrial> = combinations
            .into_iter()
            .zip(fold_scores.chunks(splits.len()))
            .map(|(params, scores)| GridTrial {
                params,
                cv: CVResults::from_scores(scores.to_vec()),
            })
            .collect();

        let best_idx = trials
            .iter()
            .enumerate()
            .fold(0, |best, (idx, trial)| {
                if trial.cv.mean_score > trials[best].cv.mean_score {
                    idx
                } else {
                    best
                }
            });

        let mut best_model = self.family.build(&trials[best_idx].params, self.random_state)?;
        best_model.fit(x, y)?;

        debug!(
            family = %self.family,
            combinations = trials.len(),
            folds = splits.len(),
            best_score = trials[best_idx].cv.mean_score,
            best_params = %format_params(&trials[best_idx].params),
            "Grid search finished"
        );

        Ok(GridSearchResult {
            trials,
            best_idx,
            best_model,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn score_fold(&self, params: &ParamSet, x: &Array2<f64>, y: &Array1<f64>, split: &CVSplit) -> Result<f64> {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = self.family.build(params, self.random_state)?;
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_test)?;
        Ok(accuracy_score(&y_test, &predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::grid::ParameterValue;

    /// Feature 0 decides the label; feature 1 is noise
    fn make_data() -> (Array2<f64>, Array1<f64>) {
        let n = 30;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                if i % 2 == 0 { 0.0 } else { 1.0 }
            } else {
                ((i * 7) % 5) as f64
            }
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y)
    }

    #[test]
    fn test_grid_search_scores_every_combination() {
        let (x, y) = make_data();
        let grid = ParamGrid::new()
            .with_param("max_depth", vec![ParameterValue::Int(1), ParameterValue::Int(3)])
            .with_param(
                "criterion",
                vec![ParameterValue::String("gini".into()), ParameterValue::String("entropy".into())],
            );

        let result = GridSearchCV::new(ModelFamily::DecisionTree, grid).fit(&x, &y).unwrap();
        assert_eq!(result.trials.len(), 4);
        assert!(result.trials.iter().all(|t| t.cv.n_folds == 3));
        assert!((result.best_score() - 1.0).abs() < 1e-12);
        // Every combination is perfect, so the first one wins
        assert_eq!(result.best_idx, 0);
        assert_eq!(result.best_params()["criterion"], ParameterValue::String("gini".into()));
        assert_eq!(result.best_model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_better_combination_wins() {
        let (x, y) = make_data();
        // Zero rounds leave the log odds at the prior, which scores 0.5
        let grid = ParamGrid::new().with_param(
            "n_estimators",
            vec![ParameterValue::Int(0), ParameterValue::Int(20)],
        );
        let result = GridSearchCV::new(ModelFamily::GradientBoosting, grid).fit(&x, &y).unwrap();
        assert_eq!(result.best_idx, 1);
        assert!(result.best_score() > result.trials[0].cv.mean_score);
    }

    #[test]
    fn test_empty_grid_runs_defaults_once() {
        let (x, y) = make_data();
        let result = GridSearchCV::new(ModelFamily::LogisticRegression, ParamGrid::new())
            .fit(&x, &y)
            .unwrap();
        assert_eq!(result.trials.len(), 1);
        assert!(result.best_params().is_empty());
    }

    #[test]
    fn test_invalid_parameter_aborts_search() {
        let (x, y) = make_data();
        let grid = ParamGrid::new().with_param("algorithm", vec![ParameterValue::String("SAMME.R".into())]);
        let result = GridSearchCV::new(ModelFamily::AdaBoost, grid).fit(&x, &y);
        assert!(matches!(result, Err(MushroomError::InvalidParameter { .. })));
    }

    #[test]
    fn test_deterministic_under_parallelism() {
        let (x, y) = make_data();
        let grid = ParamGrid::new().with_param(
            "n_estimators",
            vec![ParameterValue::Int(4), ParameterValue::Int(8)],
        );
        let search = GridSearchCV::new(ModelFamily::RandomForest, grid).with_random_state(3);
        let a = search.fit(&x, &y).unwrap();
        let b = search.fit(&x, &y).unwrap();
        for (ta, tb) in a.trials.iter().zip(b.trials.iter()) {
            assert_eq!(ta.cv.scores, tb.cv.scores);
        }
        assert_eq!(a.best_idx, b.best_idx);
    }
}
