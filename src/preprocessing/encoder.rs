//! Categorical encoding implementations

use std::collections::BTreeSet;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MushroomError, Result, Stage};

/// Read a column as owned, trimmed strings. Nulls and blank values are
/// reported as a missing field, the same way an inference record treats them.
pub(crate) fn string_column(df: &DataFrame, name: &str, stage: Stage) -> Result<Vec<String>> {
    let column = df.column(name).map_err(|_| MushroomError::MissingColumn {
        stage,
        column: name.to_string(),
    })?;
    let series = column
        .as_materialized_series()
        .cast(&DataType::String)
        .map_err(|e| MushroomError::data_source(stage, e))?;
    let ca = series
        .str()
        .map_err(|e| MushroomError::data_source(stage, e))?;

    ca.into_iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| MushroomError::MissingField {
                    stage,
                    field: name.to_string(),
                })
        })
        .collect()
}

/// One-hot encoder over a fixed, ordered set of columns.
///
/// Categories per column are sorted lexically at fit time. A category not seen
/// during fit encodes to an all-zero block for its column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoder {
    /// Create an encoder for `columns`, in that order
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    /// Learn the categories of every column
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut categories = Vec::with_capacity(self.columns.len());
        for name in &self.columns {
            let values = string_column(df, name, Stage::Transformation)?;
            let unique: BTreeSet<String> = values.into_iter().collect();
            categories.push(unique.into_iter().collect());
        }

        self.categories = categories;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode every row of `df`
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.ensure_fitted()?;

        let columns: Vec<Vec<String>> = self
            .columns
            .iter()
            .map(|name| string_column(df, name, Stage::Transformation))
            .collect::<Result<_>>()?;

        let mut out = Array2::zeros((df.height(), self.n_features()));
        for row in 0..df.height() {
            let mut offset = 0;
            for (col_idx, cats) in self.categories.iter().enumerate() {
                if let Ok(pos) = cats.binary_search(&columns[col_idx][row]) {
                    out[[row, offset + pos]] = 1.0;
                }
                offset += cats.len();
            }
        }
        Ok(out)
    }

    /// Encode one record given as values in column order
    pub fn transform_values(&self, values: &[&str]) -> Result<Array1<f64>> {
        self.ensure_fitted()?;
        if values.len() != self.columns.len() {
            return Err(MushroomError::ShapeError {
                expected: format!("{} values", self.columns.len()),
                actual: format!("{} values", values.len()),
            });
        }

        let mut out = Array1::zeros(self.n_features());
        let mut offset = 0;
        for (cats, value) in self.categories.iter().zip(values) {
            let value = value.trim();
            if let Ok(pos) = cats.binary_search_by(|c| c.as_str().cmp(value)) {
                out[offset + pos] = 1.0;
            }
            offset += cats.len();
        }
        Ok(out)
    }

    /// Output column names, `{column}_{category}`
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(col, cats)| cats.iter().map(move |cat| format!("{}_{}", col, cat)))
            .collect()
    }

    /// Width of the encoded vector
    pub fn n_features(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    fn ensure_fitted(&self) -> Result<()> {
        if self.is_fitted {
            Ok(())
        } else {
            Err(MushroomError::ModelNotFitted)
        }
    }
}

/// Maps target label strings to consecutive integers in sorted order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the sorted set of labels
    pub fn fit(&mut self, labels: &[String]) -> &mut Self {
        let unique: BTreeSet<&String> = labels.iter().collect();
        self.classes = unique.into_iter().cloned().collect();
        self
    }

    /// Encode labels; a label absent at fit time is an error
    pub fn transform(&self, labels: &[String]) -> Result<Array1<f64>> {
        labels
            .iter()
            .map(|label| {
                self.classes
                    .binary_search(label)
                    .map(|idx| idx as f64)
                    .map_err(|_| MushroomError::UnseenLabel {
                        stage: Stage::Transformation,
                        label: label.clone(),
                    })
            })
            .collect()
    }

    pub fn fit_transform(&mut self, labels: &[String]) -> Result<Array1<f64>> {
        self.fit(labels);
        self.transform(labels)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!(
            "bruises" => &["t", "f", "t", "f"],
            "odor" => &["p", "a", "l", "n"]
        )
        .unwrap()
    }

    #[test]
    fn test_onehot_sorted_categories() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::new(&["bruises", "odor"]);
        encoder.fit(&df).unwrap();

        assert_eq!(encoder.categories()[0], vec!["f", "t"]);
        assert_eq!(encoder.n_features(), 6);
        assert_eq!(encoder.feature_names()[0], "bruises_f");

        let encoded = encoder.transform(&df).unwrap();
        assert_eq!(encoded.shape(), &[4, 6]);
        // row 0: bruises=t -> index 1, odor=p -> offset 2 + index 3
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        for row in encoded.rows() {
            assert_eq!(row.sum(), 2.0);
        }
    }

    #[test]
    fn test_onehot_unknown_category_is_zero_block() {
        let mut encoder = OneHotEncoder::new(&["bruises", "odor"]);
        encoder.fit(&sample_df()).unwrap();

        let encoded = encoder.transform_values(&["t", "z"]).unwrap();
        assert_eq!(encoded.to_vec(), vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_padded_values_encode_like_trimmed() {
        let padded = df!(
            "bruises" => &[" t", "f ", "t", "f"],
            "odor" => &["p", "a", " l ", "n"]
        )
        .unwrap();
        let mut encoder = OneHotEncoder::new(&["bruises", "odor"]);
        encoder.fit(&padded).unwrap();

        assert_eq!(encoder.categories()[0], vec!["f", "t"]);
        assert_eq!(encoder.transform(&padded).unwrap(), encoder.transform(&sample_df()).unwrap());
        assert_eq!(
            encoder.transform_values(&["t ", " p"]).unwrap(),
            encoder.transform(&sample_df()).unwrap().row(0)
        );
    }

    #[test]
    fn test_blank_value_is_missing_field() {
        let df = df!("bruises" => &["t", "  "]).unwrap();
        let mut encoder = OneHotEncoder::new(&["bruises"]);
        let result = encoder.fit(&df);
        assert!(matches!(result, Err(MushroomError::MissingField { field, .. }) if field == "bruises"));
    }

    #[test]
    fn test_onehot_missing_column() {
        let mut encoder = OneHotEncoder::new(&["bruises", "gill-size"]);
        let result = encoder.fit(&sample_df());
        assert!(matches!(result, Err(MushroomError::MissingColumn { column, .. }) if column == "gill-size"));
    }

    #[test]
    fn test_onehot_requires_fit() {
        let encoder = OneHotEncoder::new(&["bruises"]);
        assert!(matches!(encoder.transform(&sample_df()), Err(MushroomError::ModelNotFitted)));
    }

    #[test]
    fn test_label_encoder_alphabetical() {
        let labels: Vec<String> = ["p", "e", "p", "e"].iter().map(|s| s.to_string()).collect();
        let mut encoder = LabelEncoder::new();
        let encoded = encoder.fit_transform(&labels).unwrap();

        assert_eq!(encoded.to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(encoder.classes(), &["e".to_string(), "p".to_string()]);
    }

    #[test]
    fn test_label_encoder_unseen_label() {
        let mut encoder = LabelEncoder::new();
        encoder.fit(&["e".to_string(), "p".to_string()]);

        let result = encoder.transform(&["x".to_string()]);
        assert!(matches!(result, Err(MushroomError::UnseenLabel { label, .. }) if label == "x"));
    }
}
