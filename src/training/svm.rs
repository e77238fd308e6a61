//! Support Vector Machine classifier
//!
//! Trained with SMO (Sequential Minimal Optimization). Two classes use a single
//! machine; more classes use one-vs-rest.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MushroomError, Result};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1 / (n_features * var(X))
    Scale,
    /// 1 / n_features
    Auto,
    Value(f64),
}

impl Gamma {
    fn resolve(&self, x: &Array2<f64>) -> f64 {
        let n_features = x.ncols().max(1) as f64;
        match *self {
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 { 1.0 / (n_features * var) } else { 1.0 }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Value(g) => g,
        }
    }
}

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF,
    /// Sigmoid kernel: K(x, y) = tanh(γ * x · y + r)
    Sigmoid { coef0: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Kernel coefficient for RBF, polynomial and sigmoid kernels
    pub gamma: Gamma,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    /// Random seed
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1000,
            random_state: 42,
        }
    }
}

/// A single binary SVM, positive class labelled +1
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySVM {
    support_vectors: Array2<f64>,
    alphas: Array1<f64>,
    support_labels: Array1<f64>,
    bias: f64,
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    /// Gamma resolved against the training data
    gamma: f64,
    /// Unique class labels
    classes: Vec<i64>,
    /// One machine for two classes, one per class otherwise
    machines: Vec<BinarySVM>,
}

impl SVMClassifier {
    /// Create a new SVM classifier
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            gamma: 1.0,
            classes: Vec::new(),
            machines: Vec::new(),
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Fit the classifier (supports binary and multi-class via One-vs-Rest)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(MushroomError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if let Some((i, v)) = y.iter().enumerate().find(|(_, v)| (*v - v.round()).abs() > 1e-9) {
            return Err(MushroomError::ValidationError(format!(
                "SVM classifier requires integer class labels, but sample {} has label {}",
                i, v
            )));
        }
        if self.config.c <= 0.0 {
            return Err(MushroomError::invalid_parameter("c", self.config.c, "must be positive"));
        }
        if x.nrows() > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(MushroomError::ValidationError(format!(
                "Dataset has {} samples, exceeding the maximum {} for the SVM kernel matrix",
                x.nrows(),
                MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
        classes.sort_unstable();
        classes.dedup();

        if classes.len() < 2 {
            return Err(MushroomError::ValidationError(
                "SVM requires at least 2 distinct classes".to_string(),
            ));
        }

        self.classes = classes;
        self.gamma = self.config.gamma.resolve(x);
        let kernel_matrix = self.compute_kernel_matrix(x);

        // Binary: classes[1] is the positive side
        let positives: Vec<i64> = if self.classes.len() == 2 {
            vec![self.classes[1]]
        } else {
            self.classes.clone()
        };

        self.machines = positives
            .iter()
            .map(|&cls| {
                let y_binary = y.mapv(|v| if v.round() as i64 == cls { 1.0 } else { -1.0 });
                self.train_machine(x, &y_binary, &kernel_matrix)
            })
            .collect();

        Ok(self)
    }

    fn train_machine(&self, x: &Array2<f64>, y: &Array1<f64>, kernel_matrix: &Array2<f64>) -> BinarySVM {
        let (alphas, bias) = self.smo_train(y, kernel_matrix);

        let support_indices: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        BinarySVM {
            support_vectors: x.select(Axis(0), &support_indices),
            alphas: alphas.select(Axis(0), &support_indices),
            support_labels: y.select(Axis(0), &support_indices),
            bias,
        }
    }

    /// SMO training algorithm over a precomputed kernel matrix
    fn smo_train(&self, y: &Array1<f64>, kernel_matrix: &Array2<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let mut alphas = Array1::zeros(n);
        let mut bias = 0.0;

        if n <= 1 {
            return (alphas, bias);
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision_cached(kernel_matrix, &alphas, y, bias, i) - y[i];

                // KKT violation
                if (y[i] * e_i < -self.config.tol && alphas[i] < c)
                    || (y[i] * e_i > self.config.tol && alphas[i] > 0.0)
                {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };

                    let e_j = decision_cached(kernel_matrix, &alphas, y, bias, j) - y[j];

                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alphas[j] - alphas[i]).max(0.0), (c + alphas[j] - alphas[i]).min(c))
                    } else {
                        ((alphas[i] + alphas[j] - c).max(0.0), (alphas[i] + alphas[j]).min(c))
                    };

                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * kernel_matrix[[i, j]] - kernel_matrix[[i, i]] - kernel_matrix[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    alphas[j] = (alphas[j] - y[j] * (e_i - e_j) / eta).clamp(l, h);

                    if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }

                    alphas[i] += y[i] * y[j] * (alpha_j_old - alphas[j]);

                    let b1 = bias
                        - e_i
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, i]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[i, j]];

                    let b2 = bias
                        - e_j
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, j]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[j, j]];

                    bias = if alphas[i] > 0.0 && alphas[i] < c {
                        b1
                    } else if alphas[j] > 0.0 && alphas[j] < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Kernel matrix, rows computed in parallel
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| self.kernel(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// Compute kernel between two vectors
    fn kernel(&self, x1: ArrayView1<f64>, x2: ArrayView1<f64>) -> f64 {
        let gamma = self.gamma;
        match self.config.kernel {
            KernelType::Linear => x1.dot(&x2),
            KernelType::Polynomial { degree, coef0 } => {
                (gamma * x1.dot(&x2) + coef0).powi(degree.min(i32::MAX as u32) as i32)
            }
            KernelType::RBF => {
                let norm_sq: f64 = x1.iter().zip(x2.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (-gamma * norm_sq).exp()
            }
            KernelType::Sigmoid { coef0 } => (gamma * x1.dot(&x2) + coef0).tanh(),
        }
    }

    fn score_sample(&self, sample: ArrayView1<f64>, machine: &BinarySVM) -> f64 {
        machine
            .support_vectors
            .rows()
            .into_iter()
            .zip(machine.alphas.iter().zip(machine.support_labels.iter()))
            .map(|(sv, (alpha, label))| alpha * label * self.kernel(sample, sv))
            .sum::<f64>()
            + machine.bias
    }

    /// Predict class labels (binary and multi-class)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.machines.is_empty() {
            return Err(MushroomError::ModelNotFitted);
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                if let [machine] = self.machines.as_slice() {
                    let class = if self.score_sample(row, machine) >= 0.0 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    };
                    return class as f64;
                }

                let mut best_score = f64::NEG_INFINITY;
                let mut best_class = self.classes[0];
                for (machine, &class) in self.machines.iter().zip(&self.classes) {
                    let score = self.score_sample(row, machine);
                    if score > best_score {
                        best_score = score;
                        best_class = class;
                    }
                }
                best_class as f64
            })
            .collect())
    }

    /// Gamma used by the fitted kernel
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
    }
}

fn decision_cached(k: &Array2<f64>, alphas: &Array1<f64>, y: &Array1<f64>, bias: f64, idx: usize) -> f64 {
    alphas
        .iter()
        .zip(y.iter())
        .zip(k.column(idx).iter())
        .map(|((a, yi), kv)| a * yi * kv)
        .sum::<f64>()
        + bias
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_linear_separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, 5.0, 5.0, 5.5, 5.2, 6.0, 6.0, 5.2, 5.8,
                4.8, 5.5,
            ],
        )
        .unwrap();

        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);

        (x, y)
    }

    fn accuracy(pred: &Array1<f64>, y: &Array1<f64>) -> f64 {
        y.iter().zip(pred.iter()).filter(|(&yi, &pi)| yi == pi).count() as f64 / y.len() as f64
    }

    #[test]
    fn test_svm_classifier_linear() {
        let (x, y) = create_linear_separable_data();

        let config = SVMConfig {
            kernel: KernelType::Linear,
            ..Default::default()
        };

        let mut svm = SVMClassifier::new(config);
        svm.fit(&x, &y).unwrap();

        let acc = accuracy(&svm.predict(&x).unwrap(), &y);
        assert!(acc > 0.8, "Accuracy {} should be > 0.8", acc);
        assert!(svm.n_support_vectors() > 0);
    }

    #[test]
    fn test_svm_classifier_rbf() {
        let (x, y) = create_linear_separable_data();

        let config = SVMConfig {
            kernel: KernelType::RBF,
            gamma: Gamma::Value(0.5),
            ..Default::default()
        };

        let mut svm = SVMClassifier::new(config);
        svm.fit(&x, &y).unwrap();

        assert_eq!(svm.predict(&x).unwrap().len(), 10);
        assert_eq!(svm.gamma(), 0.5);
    }

    #[test]
    fn test_gamma_resolution() {
        let x = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 2.0, 2.0]).unwrap();
        // var over all elements = 1
        assert_eq!(Gamma::Scale.resolve(&x), 0.5);
        assert_eq!(Gamma::Auto.resolve(&x), 0.5);
        assert_eq!(Gamma::Scale.resolve(&Array2::zeros((2, 2))), 1.0);
    }

    #[test]
    fn test_svm_classifier_multiclass() {
        let x = Array2::from_shape_vec(
            (15, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, 5.0, 5.0, 5.5, 5.2, 6.0, 6.0, 5.2, 5.8,
                4.8, 5.5, 1.0, 5.0, 1.5, 5.2, 2.0, 6.0, 1.2, 5.8, 0.8, 5.5,
            ],
        )
        .unwrap();

        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0,
        ]);

        let config = SVMConfig {
            c: 10.0,
            kernel: KernelType::RBF,
            gamma: Gamma::Value(0.5),
            ..Default::default()
        };

        let mut svm = SVMClassifier::new(config);
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        assert!(predictions.iter().all(|&p| p == 0.0 || p == 1.0 || p == 2.0));
        assert!(accuracy(&predictions, &y) > 0.6);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((3, 2));
        let y = Array1::from_vec(vec![1.0, 1.0, 1.0]);
        let mut svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(svm.fit(&x, &y), Err(MushroomError::ValidationError(_))));
    }
}
