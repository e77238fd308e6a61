//! Model training module
//!
//! Native implementations of the candidate classifier families, plus the
//! grid search and selection machinery that picks one of them:
//! - Logistic regression
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost, CatBoost
//! - AdaBoost (SAMME)
//! - Support Vector Machines

mod models;
pub mod adaboost;
pub mod catboost;
pub mod classifier;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod grid;
pub mod grid_search;
pub mod linear_models;
pub mod random_forest;
pub mod selection;
pub mod svm;
pub mod xgboost;

pub use adaboost::AdaBoostClassifier;
pub use catboost::{CatBoostClassifier, CatBoostConfig};
pub use classifier::{ModelArtifact, ModelFamily, TrainedModel};
pub use cross_validation::{CVResults, CVSplit, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, MaxFeatures, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use grid::{format_params, Candidate, CandidateSet, ParamGrid, ParamSet, ParameterValue};
pub use grid_search::{GridSearchCV, GridSearchResult, GridTrial};
pub use linear_models::LogisticRegression;
pub use models::{accuracy_score, ModelMetrics};
pub use random_forest::RandomForest;
pub use selection::{EvaluationReport, FamilyReport, ModelSelector, SelectionOutcome};
pub use svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
