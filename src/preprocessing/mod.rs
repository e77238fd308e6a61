//! Feature preprocessing
//!
//! The [`FeatureEncoder`] turns the seven categorical attributes into a numeric
//! vector: one-hot encoding followed by scaling without centering, so one-hot
//! zeros stay zero.

mod encoder;
mod scaler;

pub use encoder::{LabelEncoder, OneHotEncoder};
pub(crate) use encoder::string_column;
pub use scaler::Scaler;

use ndarray::{Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact;
use crate::config::FEATURE_COLUMNS;
use crate::error::Result;

/// Fitted categorical → numeric pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    one_hot: OneHotEncoder,
    scaler: Scaler,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEncoder {
    /// Unfitted encoder over the mushroom feature columns
    pub fn new() -> Self {
        Self::with_columns(&FEATURE_COLUMNS)
    }

    /// Unfitted encoder over arbitrary categorical columns
    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            one_hot: OneHotEncoder::new(columns),
            scaler: Scaler::new(),
        }
    }

    /// Fit on `df` and return its encoding
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.one_hot.fit(df)?;
        let encoded = self.one_hot.transform(df)?;
        let scaled = self.scaler.fit_transform(&encoded)?;
        debug!(
            rows = df.height(),
            features = self.n_features(),
            "Feature encoder fitted"
        );
        Ok(scaled)
    }

    /// Encode every row of `df` with the fitted parameters
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let encoded = self.one_hot.transform(df)?;
        self.scaler.transform(&encoded)
    }

    /// Encode one record given in column order
    pub fn transform_values(&self, values: &[&str]) -> Result<Array2<f64>> {
        let mut row = self.one_hot.transform_values(values)?;
        self.scaler.transform_row(&mut row)?;
        Ok(row.insert_axis(Axis(0)))
    }

    pub fn columns(&self) -> &[String] {
        self.one_hot.columns()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.one_hot.feature_names()
    }

    pub fn n_features(&self) -> usize {
        self.one_hot.n_features()
    }

    /// Content hash binding a model to the encoder it was trained with
    pub fn fingerprint(&self) -> Result<String> {
        artifact::fingerprint(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mushrooms() -> DataFrame {
        df!(
            "bruises" => &["t", "f", "t", "f"],
            "gill-spacing" => &["c", "w", "c", "c"],
            "gill-size" => &["n", "b", "b", "n"],
            "gill-color" => &["k", "k", "n", "g"],
            "stalk-root" => &["e", "c", "c", "e"],
            "ring-type" => &["p", "p", "e", "p"],
            "spore-print-color" => &["k", "n", "n", "k"]
        )
        .unwrap()
    }

    #[test]
    fn test_fit_transform_width() {
        let mut encoder = FeatureEncoder::new();
        let x = encoder.fit_transform(&mushrooms()).unwrap();
        // 2 + 2 + 2 + 3 + 2 + 2 + 2 categories
        assert_eq!(x.shape(), &[4, 15]);
        assert_eq!(encoder.feature_names().len(), 15);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let df = mushrooms();
        let mut encoder = FeatureEncoder::new();
        encoder.fit_transform(&df).unwrap();

        let a = encoder.transform(&df).unwrap();
        let b = encoder.transform(&df).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_record_matches_frame_row() {
        let df = mushrooms();
        let mut encoder = FeatureEncoder::new();
        let x = encoder.fit_transform(&df).unwrap();

        let row = encoder
            .transform_values(&["f", "w", "b", "k", "c", "p", "n"])
            .unwrap();
        assert_eq!(row.row(0), x.row(1));
    }

    #[test]
    fn test_fingerprint_changes_with_fit() {
        let unfitted = FeatureEncoder::new();
        let mut fitted = FeatureEncoder::new();
        fitted.fit_transform(&mushrooms()).unwrap();

        assert_ne!(unfitted.fingerprint().unwrap(), fitted.fingerprint().unwrap());
    }
}
