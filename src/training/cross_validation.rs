//! Cross-validation splitters

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{MushroomError, Result};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified K-fold splitter. Rows keep their original order, so the folds
/// are a pure function of the targets.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    n_splits: usize,
}

impl CrossValidator {
    pub fn stratified(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Generate train/test splits that keep the class distribution of `y`
    pub fn split(&self, n_samples: usize, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(MushroomError::ValidationError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(MushroomError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        if y.len() != n_samples {
            return Err(MushroomError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.stratified_k_fold_split(y, n_splits)
    }

    /// Each class is dealt into folds in contiguous runs sized so that every
    /// fold receives its share of every class.
    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize) -> Result<Vec<CVSplit>> {
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if class_indices.values().all(|members| members.len() < n_splits) {
            return Err(MushroomError::ValidationError(format!(
                "n_splits ({}) is greater than the number of members in every class",
                n_splits
            )));
        }

        // Labels in sorted order, dealt round-robin, give the per-fold quota of each class
        let sorted_labels: Vec<usize> = class_indices
            .values()
            .enumerate()
            .flat_map(|(class_pos, members)| std::iter::repeat(class_pos).take(members.len()))
            .collect();
        let mut quota = vec![vec![0usize; class_indices.len()]; n_splits];
        for (i, &class_pos) in sorted_labels.iter().enumerate() {
            quota[i % n_splits][class_pos] += 1;
        }

        let mut test_fold = vec![0usize; y.len()];
        for (class_pos, members) in class_indices.values().enumerate() {
            let mut members = members.iter();
            for (fold_idx, fold_quota) in quota.iter().enumerate() {
                for &idx in members.by_ref().take(fold_quota[class_pos]) {
                    test_fold[idx] = fold_idx;
                }
            }
        }

        Ok((0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| test_fold[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: 0.0,
                std_score: 0.0,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}
