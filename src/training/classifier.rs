//! Model families and the persisted model envelope
//!
//! [`ModelFamily`] turns one grid combination into an unfitted
//! [`TrainedModel`]; parameter names and value types are checked here so that
//! a bad grid fails before any fitting starts.

use std::fmt;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::adaboost::AdaBoostClassifier;
use super::catboost::{CatBoostClassifier, CatBoostConfig};
use super::decision_tree::{Criterion, DecisionTree, MaxFeatures};
use super::grid::{ParamSet, ParameterValue};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{MushroomError, Result};

/// The classifier families the selector can search over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "logistic_regression")]
    LogisticRegression,
    #[serde(rename = "xgboost")]
    XGBoost,
    #[serde(rename = "decision_tree")]
    DecisionTree,
    #[serde(rename = "random_forest")]
    RandomForest,
    #[serde(rename = "gradient_boosting")]
    GradientBoosting,
    #[serde(rename = "ada_boost")]
    AdaBoost,
    #[serde(rename = "svc")]
    SupportVector,
    #[serde(rename = "catboost")]
    CatBoost,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 8] = [
        ModelFamily::LogisticRegression,
        ModelFamily::XGBoost,
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::AdaBoost,
        ModelFamily::SupportVector,
        ModelFamily::CatBoost,
    ];

    /// Key used in grid files
    pub fn key(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::XGBoost => "xgboost",
            ModelFamily::DecisionTree => "decision_tree",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::AdaBoost => "ada_boost",
            ModelFamily::SupportVector => "svc",
            ModelFamily::CatBoost => "catboost",
        }
    }

    /// Parameter names accepted in a grid for this family
    pub fn known_params(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::LogisticRegression => &["alpha", "fit_intercept", "learning_rate", "max_iter"],
            ModelFamily::XGBoost => &[
                "colsample_bytree",
                "gamma",
                "learning_rate",
                "max_depth",
                "min_child_weight",
                "n_estimators",
                "reg_alpha",
                "reg_lambda",
                "subsample",
            ],
            ModelFamily::DecisionTree => &[
                "criterion",
                "max_depth",
                "max_features",
                "min_samples_leaf",
                "min_samples_split",
            ],
            ModelFamily::RandomForest => &[
                "bootstrap",
                "criterion",
                "max_depth",
                "max_features",
                "min_samples_leaf",
                "min_samples_split",
                "n_estimators",
            ],
            ModelFamily::GradientBoosting => &[
                "learning_rate",
                "max_depth",
                "max_features",
                "min_samples_leaf",
                "n_estimators",
                "subsample",
            ],
            ModelFamily::AdaBoost => &["learning_rate", "n_estimators"],
            ModelFamily::SupportVector => &["C", "c", "coef0", "degree", "gamma", "kernel", "max_iter", "tol"],
            ModelFamily::CatBoost => &["depth", "iterations", "l2_leaf_reg", "learning_rate", "subsample"],
        }
    }

    /// Build an unfitted model from one grid combination. `seed` drives
    /// every random choice the model makes.
    pub fn build(&self, params: &ParamSet, seed: u64) -> Result<TrainedModel> {
        let p = Params::new(*self, params)?;

        let model = match self {
            ModelFamily::LogisticRegression => {
                let mut model = LogisticRegression::new().with_max_iter(p.usize("max_iter")?.unwrap_or(1000));
                if let Some(alpha) = p.f64("alpha")? {
                    model = model.with_alpha(alpha);
                }
                if let Some(lr) = p.f64("learning_rate")? {
                    model = model.with_learning_rate(lr);
                }
                if let Some(fit_intercept) = p.bool("fit_intercept")? {
                    model = model.with_fit_intercept(fit_intercept);
                }
                TrainedModel::LogisticRegression(model)
            }
            ModelFamily::XGBoost => {
                let defaults = XGBoostConfig::default();
                TrainedModel::XGBoost(XGBoostClassifier::new(XGBoostConfig {
                    n_estimators: p.usize("n_estimators")?.unwrap_or(defaults.n_estimators),
                    learning_rate: p.f64("learning_rate")?.unwrap_or(defaults.learning_rate),
                    max_depth: p.usize("max_depth")?.unwrap_or(defaults.max_depth),
                    min_child_weight: p.f64("min_child_weight")?.unwrap_or(defaults.min_child_weight),
                    reg_lambda: p.f64("reg_lambda")?.unwrap_or(defaults.reg_lambda),
                    reg_alpha: p.f64("reg_alpha")?.unwrap_or(defaults.reg_alpha),
                    gamma: p.f64("gamma")?.unwrap_or(defaults.gamma),
                    subsample: p.f64("subsample")?.unwrap_or(defaults.subsample),
                    colsample_bytree: p.f64("colsample_bytree")?.unwrap_or(defaults.colsample_bytree),
                    random_state: seed,
                }))
            }
            ModelFamily::DecisionTree => {
                let mut tree = DecisionTree::new_classifier()
                    .with_criterion(p.criterion()?.unwrap_or(Criterion::Gini))
                    .with_max_features(p.max_features()?.unwrap_or(MaxFeatures::All))
                    .with_random_state(seed);
                if let Some(depth) = p.usize("max_depth")? {
                    tree = tree.with_max_depth(depth);
                }
                if let Some(n) = p.usize("min_samples_split")? {
                    tree = tree.with_min_samples_split(n);
                }
                if let Some(n) = p.usize("min_samples_leaf")? {
                    tree = tree.with_min_samples_leaf(n);
                }
                TrainedModel::DecisionTree(tree)
            }
            ModelFamily::RandomForest => {
                let mut forest = RandomForest::new_classifier(p.usize("n_estimators")?.unwrap_or(100))
                    .with_criterion(p.criterion()?.unwrap_or(Criterion::Gini))
                    .with_max_features(p.max_features()?.unwrap_or(MaxFeatures::Sqrt))
                    .with_bootstrap(p.bool("bootstrap")?.unwrap_or(true))
                    .with_random_state(seed);
                if let Some(depth) = p.usize("max_depth")? {
                    forest = forest.with_max_depth(depth);
                }
                if let Some(n) = p.usize("min_samples_split")? {
                    forest = forest.with_min_samples_split(n);
                }
                if let Some(n) = p.usize("min_samples_leaf")? {
                    forest = forest.with_min_samples_leaf(n);
                }
                TrainedModel::RandomForest(forest)
            }
            ModelFamily::GradientBoosting => {
                let defaults = GradientBoostingConfig::default();
                TrainedModel::GradientBoosting(GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: p.usize("n_estimators")?.unwrap_or(defaults.n_estimators),
                    learning_rate: p.f64("learning_rate")?.unwrap_or(defaults.learning_rate),
                    max_depth: p.usize("max_depth")?.unwrap_or(defaults.max_depth),
                    min_samples_leaf: p.usize("min_samples_leaf")?.unwrap_or(defaults.min_samples_leaf),
                    subsample: p.f64("subsample")?.unwrap_or(defaults.subsample),
                    max_features: p.max_features()?.unwrap_or(defaults.max_features),
                    random_state: seed,
                }))
            }
            ModelFamily::AdaBoost => {
                let defaults = AdaBoostClassifier::default();
                TrainedModel::AdaBoost(AdaBoostClassifier::new(
                    p.usize("n_estimators")?.unwrap_or(defaults.n_estimators),
                    p.f64("learning_rate")?.unwrap_or(defaults.learning_rate),
                ))
            }
            ModelFamily::SupportVector => {
                let defaults = SVMConfig::default();
                let c = match p.f64("C")? {
                    Some(c) => Some(c),
                    None => p.f64("c")?,
                };
                TrainedModel::SupportVector(SVMClassifier::new(SVMConfig {
                    c: c.unwrap_or(defaults.c),
                    kernel: p.kernel()?.unwrap_or(defaults.kernel),
                    gamma: p.gamma()?.unwrap_or(defaults.gamma),
                    tol: p.f64("tol")?.unwrap_or(defaults.tol),
                    max_iter: p.usize("max_iter")?.unwrap_or(defaults.max_iter),
                    random_state: seed,
                }))
            }
            ModelFamily::CatBoost => {
                let defaults = CatBoostConfig::default();
                TrainedModel::CatBoost(CatBoostClassifier::new(CatBoostConfig {
                    n_estimators: p.usize("iterations")?.unwrap_or(defaults.n_estimators),
                    learning_rate: p.f64("learning_rate")?.unwrap_or(defaults.learning_rate),
                    max_depth: p.usize("depth")?.unwrap_or(defaults.max_depth),
                    reg_lambda: p.f64("l2_leaf_reg")?.unwrap_or(defaults.reg_lambda),
                    subsample: p.f64("subsample")?.unwrap_or(defaults.subsample),
                    random_state: seed,
                }))
            }
        };

        Ok(model)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Typed access to one grid combination
struct Params<'a> {
    family: ModelFamily,
    params: &'a ParamSet,
}

impl<'a> Params<'a> {
    fn new(family: ModelFamily, params: &'a ParamSet) -> Result<Self> {
        let known = family.known_params();
        if let Some((name, value)) = params.iter().find(|(name, _)| !known.contains(&name.as_str())) {
            return Err(MushroomError::invalid_parameter(
                name.clone(),
                value,
                format!("not a parameter of {}", family),
            ));
        }
        Ok(Self { family, params })
    }

    /// `None` when absent or `null`
    fn get(&self, name: &str) -> Option<&'a ParameterValue> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    fn mistyped(&self, name: &str, value: &ParameterValue, expected: &str) -> MushroomError {
        MushroomError::invalid_parameter(name, value, format!("{} expects {}", self.family, expected))
    }

    fn usize(&self, name: &str) -> Result<Option<usize>> {
        self.get(name)
            .map(|value| match value.as_int() {
                Some(v) if v >= 0 => Ok(v as usize),
                _ => Err(self.mistyped(name, value, "a non-negative integer")),
            })
            .transpose()
    }

    fn f64(&self, name: &str) -> Result<Option<f64>> {
        self.get(name)
            .map(|value| value.as_float().ok_or_else(|| self.mistyped(name, value, "a number")))
            .transpose()
    }

    fn bool(&self, name: &str) -> Result<Option<bool>> {
        self.get(name)
            .map(|value| value.as_bool().ok_or_else(|| self.mistyped(name, value, "a boolean")))
            .transpose()
    }

    fn criterion(&self) -> Result<Option<Criterion>> {
        self.get("criterion")
            .map(|value| match value.as_string() {
                Some("gini") => Ok(Criterion::Gini),
                Some("entropy") | Some("log_loss") => Ok(Criterion::Entropy),
                _ => Err(self.mistyped("criterion", value, "\"gini\" or \"entropy\"")),
            })
            .transpose()
    }

    /// `null` means every feature
    fn max_features(&self) -> Result<Option<MaxFeatures>> {
        let Some(value) = self.params.get("max_features") else {
            return Ok(None);
        };
        let parsed = match value {
            ParameterValue::Null => MaxFeatures::All,
            ParameterValue::String(s) if s == "sqrt" => MaxFeatures::Sqrt,
            ParameterValue::String(s) if s == "log2" => MaxFeatures::Log2,
            ParameterValue::Int(n) if *n > 0 => MaxFeatures::Count(*n as usize),
            ParameterValue::Float(f) if *f > 0.0 && *f <= 1.0 => MaxFeatures::Fraction(*f),
            _ => {
                return Err(self.mistyped(
                    "max_features",
                    value,
                    "\"sqrt\", \"log2\", null, a positive count or a fraction in (0, 1]",
                ))
            }
        };
        Ok(Some(parsed))
    }

    fn kernel(&self) -> Result<Option<KernelType>> {
        let Some(value) = self.get("kernel") else {
            return Ok(None);
        };
        let coef0 = self.f64("coef0")?.unwrap_or(0.0);
        let kernel = match value.as_string() {
            Some("linear") => KernelType::Linear,
            Some("rbf") => KernelType::RBF,
            Some("poly") => {
                let degree = self.usize("degree")?.unwrap_or(3);
                KernelType::Polynomial {
                    degree: u32::try_from(degree)
                        .map_err(|_| MushroomError::invalid_parameter("degree", degree, "too large"))?,
                    coef0,
                }
            }
            Some("sigmoid") => KernelType::Sigmoid { coef0 },
            _ => return Err(self.mistyped("kernel", value, "\"linear\", \"poly\", \"rbf\" or \"sigmoid\"")),
        };
        Ok(Some(kernel))
    }

    fn gamma(&self) -> Result<Option<Gamma>> {
        self.get("gamma")
            .map(|value| match value {
                ParameterValue::String(s) if s == "scale" => Ok(Gamma::Scale),
                ParameterValue::String(s) if s == "auto" => Ok(Gamma::Auto),
                other => match other.as_float() {
                    Some(g) if g > 0.0 => Ok(Gamma::Value(g)),
                    _ => Err(self.mistyped("gamma", other, "\"scale\", \"auto\" or a positive number")),
                },
            })
            .transpose()
    }
}

/// A model of any family, fitted or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    XGBoost(XGBoostClassifier),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    AdaBoost(AdaBoostClassifier),
    SupportVector(SVMClassifier),
    CatBoost(CatBoostClassifier),
}

impl TrainedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedModel::LogisticRegression(_) => ModelFamily::LogisticRegression,
            TrainedModel::XGBoost(_) => ModelFamily::XGBoost,
            TrainedModel::DecisionTree(_) => ModelFamily::DecisionTree,
            TrainedModel::RandomForest(_) => ModelFamily::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            TrainedModel::AdaBoost(_) => ModelFamily::AdaBoost,
            TrainedModel::SupportVector(_) => ModelFamily::SupportVector,
            TrainedModel::CatBoost(_) => ModelFamily::CatBoost,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            TrainedModel::LogisticRegression(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::XGBoost(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::DecisionTree(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::RandomForest(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::GradientBoosting(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::AdaBoost(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::SupportVector(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::CatBoost(m) => {
                m.fit(x, y)?;
            }
        }
        Ok(())
    }

    /// Class indices (0.0, 1.0, ...) per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::LogisticRegression(m) => m.predict(x),
            TrainedModel::XGBoost(m) => m.predict(x),
            TrainedModel::DecisionTree(m) => m.predict(x),
            TrainedModel::RandomForest(m) => m.predict(x),
            TrainedModel::GradientBoosting(m) => m.predict(x),
            TrainedModel::AdaBoost(m) => m.predict(x),
            TrainedModel::SupportVector(m) => m.predict(x),
            TrainedModel::CatBoost(m) => m.predict(x),
        }
    }
}

/// What the model store holds: the winning model plus enough context to
/// check it against the encoder at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Candidate name, e.g. "Decision Tree"
    pub name: String,
    pub family: ModelFamily,
    pub params: ParamSet,
    /// Held-out accuracy that won the selection
    pub accuracy: f64,
    /// Fingerprint of the feature encoder the model was trained against
    pub encoder_fingerprint: String,
    pub n_features: usize,
    pub trained_at: DateTime<Utc>,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(MushroomError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        self.model.predict(x)
    }
}
