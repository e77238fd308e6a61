//! AdaBoost (Adaptive Boosting) implementation
//!
//! AdaBoost builds an ensemble of weak learners (decision stumps), weighting
//! misclassified samples more heavily in subsequent rounds.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{MushroomError, Result};

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Prediction when feature <= threshold
    left_label: f64,
    /// Prediction when feature > threshold
    right_label: f64,
}

impl Stump {
    fn predict_sample(&self, sample: ArrayView1<f64>) -> f64 {
        if sample[self.feature_index] <= self.threshold {
            self.left_label
        } else {
            self.right_label
        }
    }
}

/// AdaBoost Classifier (SAMME variant, supports multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
    pub is_fitted: bool,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Find the best decision stump given sample weights
    fn fit_stump(x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>, classes: &[f64]) -> (Stump, f64) {
        let n_samples = x.nrows();

        // Constant stump predicting the heaviest class
        let mut best_stump = Stump {
            feature_index: 0,
            threshold: f64::INFINITY,
            left_label: classes[0],
            right_label: classes[0],
        };
        let mut best_error = (0..n_samples)
            .filter(|&i| y[i] != classes[0])
            .map(|i| weights[i])
            .sum::<f64>();

        for (f, col) in x.columns().into_iter().enumerate() {
            let mut vals: Vec<f64> = col.to_vec();
            vals.sort_by(|a, b| a.total_cmp(b));
            vals.dedup();

            for w in vals.windows(2) {
                let threshold = (w[0] + w[1]) / 2.0;

                for &left_label in classes {
                    for &right_label in classes {
                        if left_label == right_label {
                            continue;
                        }
                        let error: f64 = (0..n_samples)
                            .filter(|&i| {
                                let pred = if col[i] <= threshold { left_label } else { right_label };
                                (pred - y[i]).abs() > 1e-10
                            })
                            .map(|i| weights[i])
                            .sum();
                        if error < best_error {
                            best_error = error;
                            best_stump = Stump {
                                feature_index: f,
                                threshold,
                                left_label,
                                right_label,
                            };
                        }
                    }
                }
            }
        }
        (best_stump, best_error)
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(MushroomError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MushroomError::ValidationError("AdaBoost needs at least one sample".to_string()));
        }
        if self.learning_rate <= 0.0 {
            return Err(MushroomError::invalid_parameter(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        self.classes = classes;

        let n_classes = self.classes.len() as f64;
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.stumps.clear();
        self.alphas.clear();

        for _round in 0..self.n_estimators {
            let (stump, error) = Self::fit_stump(x, y, &weights, &self.classes);

            // A perfect stump decides alone
            if error <= 1e-15 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }

            // No better than chance: stop boosting
            if error >= 1.0 - 1.0 / n_classes {
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            // SAMME
            let alpha = self.learning_rate * (((1.0 - error) / error).ln() + (n_classes - 1.0).ln());

            for (i, row) in x.rows().into_iter().enumerate() {
                if (stump.predict_sample(row) - y[i]).abs() > 1e-10 {
                    weights[i] *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Per-class weighted votes, columns in class order
    fn class_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MushroomError::ModelNotFitted);
        }

        let mut scores = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
                let pred = stump.predict_sample(row);
                if let Some(idx) = self.classes.iter().position(|&c| (c - pred).abs() < 1e-10) {
                    scores[[i, idx]] += alpha;
                }
            }
        }
        Ok(scores)
    }

    /// Class with the highest weighted vote; the earlier class wins ties
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.class_scores(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (j, &s)| if s > best.1 { (j, s) } else { best });
                self.classes[best.0]
            })
            .collect())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut proba = self.class_scores(x)?;

        // Softmax normalization
        for mut row in proba.rows_mut() {
            let max_score = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|s| (s - max_score).exp());
            let exp_sum = row.sum();
            row /= exp_sum;
        }

        Ok(proba)
    }

    /// Number of stumps kept after early stopping
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn accuracy(pred: &Array1<f64>, y: &Array1<f64>) -> f64 {
        pred.iter().zip(y.iter()).filter(|(p, a)| (*p - *a).abs() < 0.5).count() as f64 / y.len() as f64
    }

    #[test]
    fn test_adaboost_binary() {
        let x = array![
            [1.0, 2.0], [2.0, 3.0], [3.0, 4.0],
            [6.0, 7.0], [7.0, 8.0], [8.0, 9.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = AdaBoostClassifier::new(10, 1.0);
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted);
        assert_eq!(accuracy(&model.predict(&x).unwrap(), &y), 1.0);
        // separable by one stump
        assert_eq!(model.n_stumps(), 1);
    }

    #[test]
    fn test_adaboost_needs_several_rounds() {
        // no single threshold separates the classes
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let mut model = AdaBoostClassifier::new(20, 0.5);
        model.fit(&x, &y).unwrap();
        assert!(model.n_stumps() > 1);
        assert!(accuracy(&model.predict(&x).unwrap(), &y) >= 0.6);
    }

    #[test]
    fn test_adaboost_predict_proba() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [5.0, 5.0], [6.0, 6.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = AdaBoostClassifier::new(20, 1.0);
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (4, 2));
        assert!(proba[[0, 0]] > proba[[0, 1]]);
    }

    #[test]
    fn test_adaboost_rejects_non_positive_rate() {
        let mut model = AdaBoostClassifier::new(5, 0.0);
        let result = model.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]);
        assert!(matches!(result, Err(MushroomError::InvalidParameter { .. })));
    }
}
