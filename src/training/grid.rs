//! Hyperparameter grids and the ordered candidate set
//!
//! Grids follow the exhaustive-search convention: parameter names are kept in
//! sorted order and the Cartesian product varies the last name fastest, so
//! "first combination" is well defined for tie-breaking.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::classifier::ModelFamily;
use crate::config::PipelineConfig;
use crate::error::{MushroomError, Result, Stage};

/// Built-in candidate grids
const BUILTIN_GRIDS: &str = include_str!("../../config/hyperparameters.json");

/// A single hyperparameter value as written in a grid file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// `null`, e.g. an unbounded `max_depth`
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integers only; a float such as `3.5` is not silently truncated
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParameterValue::Null)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Null => f.write_str("null"),
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// One concrete assignment of hyperparameters
pub type ParamSet = BTreeMap<String, ParameterValue>;

/// Render a parameter set as `{a=1, b="x"}` for logs
pub fn format_params(params: &ParamSet) -> String {
    let body: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{{{}}}", body.join(", "))
}

/// Candidate values per parameter name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParameterValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        self.params.insert(name.into(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Number of combinations the grid expands to
    pub fn len(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    /// Cartesian product in grid order. An empty grid yields one empty
    /// combination (the family defaults).
    pub fn combinations(&self) -> Vec<ParamSet> {
        self.params.iter().fold(vec![ParamSet::new()], |acc, (name, values)| {
            acc.iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut combo = partial.clone();
                        combo.insert(name.clone(), value.clone());
                        combo
                    })
                })
                .collect()
        })
    }
}

/// A named model family with its search grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Display name, e.g. "Random Forest Classifier"
    pub name: String,
    pub family: ModelFamily,
    #[serde(default)]
    pub grid: ParamGrid,
}

/// Ordered candidates; evaluation and tie-breaking follow this order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// The grids compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_GRIDS)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let set: Self = serde_json::from_str(json)
            .map_err(|e| MushroomError::Config(format!("invalid hyperparameter grid: {}", e)))?;
        set.validate()?;
        Ok(set)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| MushroomError::io(Stage::Config, path, e))?;
        Self::from_json(&json).map_err(|e| match e {
            MushroomError::Config(msg) => MushroomError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// External grids when configured, the built-in ones otherwise
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        match &config.grids_path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.name == name)
    }

    /// Keep only the named candidates, in their original order
    pub fn retain_names(mut self, names: &[&str]) -> Self {
        self.candidates.retain(|c| names.contains(&c.name.as_str()));
        self
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for candidate in &self.candidates {
            if !seen.insert(candidate.name.as_str()) {
                return Err(MushroomError::Config(format!("duplicate candidate name: {}", candidate.name)));
            }
            if let Some((name, _)) = candidate.grid.params.iter().find(|(_, values)| values.is_empty()) {
                return Err(MushroomError::Config(format!(
                    "{}: parameter {} has no candidate values",
                    candidate.name, name
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_value_untagged() {
        let values: Vec<ParameterValue> = serde_json::from_str(r#"[null, true, 3, 0.5, "sqrt"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParameterValue::Null,
                ParameterValue::Bool(true),
                ParameterValue::Int(3),
                ParameterValue::Float(0.5),
                ParameterValue::String("sqrt".to_string()),
            ]
        );
        assert_eq!(values[2].as_float(), Some(3.0));
        assert_eq!(ParameterValue::Float(3.5).as_int(), None);
    }

    #[test]
    fn test_combinations_order() {
        let grid = ParamGrid::new()
            .with_param("n_estimators", vec![ParameterValue::Int(8), ParameterValue::Int(16)])
            .with_param("learning_rate", vec![ParameterValue::Float(0.1), ParameterValue::Float(0.01)]);

        let combos = grid.combinations();
        assert_eq!(grid.len(), 4);
        assert_eq!(combos.len(), 4);
        // Sorted names: learning_rate first, n_estimators varies fastest
        assert_eq!(combos[0]["learning_rate"], ParameterValue::Float(0.1));
        assert_eq!(combos[0]["n_estimators"], ParameterValue::Int(8));
        assert_eq!(combos[1]["learning_rate"], ParameterValue::Float(0.1));
        assert_eq!(combos[1]["n_estimators"], ParameterValue::Int(16));
        assert_eq!(combos[2]["learning_rate"], ParameterValue::Float(0.01));
    }

    #[test]
    fn test_empty_grid_has_single_default_combination() {
        let combos = ParamGrid::new().combinations();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn test_builtin_candidates() {
        let set = CandidateSet::builtin().unwrap();
        let names: Vec<&str> = set.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Logistic Regression",
                "XGBoost Classifier",
                "Decision Tree",
                "Random Forest Classifier",
                "Gradient Boosting Classifier",
                "Ada Boost Classifier",
                "Support Vector Classifier",
                "CatBoost Classifier",
            ]
        );
        assert!(set.get("Logistic Regression").unwrap().grid.is_empty());
        assert_eq!(set.get("Support Vector Classifier").unwrap().grid.len(), 8);
    }

    #[test]
    fn test_rejects_empty_value_list() {
        let json = r#"[{"name": "Decision Tree", "family": "decision_tree", "grid": {"max_depth": []}}]"#;
        assert!(matches!(CandidateSet::from_json(json), Err(MushroomError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_family() {
        let json = r#"[{"name": "KNN", "family": "knn"}]"#;
        assert!(matches!(CandidateSet::from_json(json), Err(MushroomError::Config(_))));
    }

    #[test]
    fn test_retain_names_keeps_order() {
        let set = CandidateSet::builtin()
            .unwrap()
            .retain_names(&["Decision Tree", "Logistic Regression"]);
        let names: Vec<&str> = set.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Logistic Regression", "Decision Tree"]);
    }
}
