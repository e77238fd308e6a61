//! Data transformation
//!
//! Fits the feature encoder on the training partition, encodes both
//! partitions and persists the fitted encoder.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use tracing::info;

use crate::artifact;
use crate::config::{PipelineConfig, TARGET_COLUMN};
use crate::error::{MushroomError, Result, Stage};
use crate::ingestion::read_csv;
use crate::preprocessing::{string_column, FeatureEncoder, LabelEncoder};

/// Encoded arrays plus the location of the persisted encoder
#[derive(Debug, Clone)]
pub struct TransformationArtifact {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
    pub encoder_path: PathBuf,
    /// Fingerprint of the persisted encoder
    pub encoder_fingerprint: String,
    /// Target mapping fitted on the training labels
    pub label_encoder: LabelEncoder,
}

/// Transformation stage
pub struct DataTransformation<'a> {
    config: &'a PipelineConfig,
}

impl<'a> DataTransformation<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn transform(
        &self,
        train_path: impl AsRef<Path>,
        test_path: impl AsRef<Path>,
    ) -> Result<TransformationArtifact> {
        info!("Entered data transformation");
        let train = read_csv(train_path.as_ref(), Stage::Transformation)?;
        let test = read_csv(test_path.as_ref(), Stage::Transformation)?;
        info!(train_rows = train.height(), test_rows = test.height(), "Read train and test data");

        let mut encoder = FeatureEncoder::new();
        check_schema(&train, encoder.columns())?;
        check_schema(&test, encoder.columns())?;

        let x_train = encoder.fit_transform(&train)?;
        let x_test = encoder.transform(&test)?;
        info!(features = encoder.n_features(), "Applied feature encoder to train and test data");

        let mut label_encoder = LabelEncoder::new();
        let y_train = label_encoder.fit_transform(&string_column(&train, TARGET_COLUMN, Stage::Transformation)?)?;
        let y_test = label_encoder.transform(&string_column(&test, TARGET_COLUMN, Stage::Transformation)?)?;
        info!(classes = ?label_encoder.classes(), "Encoded target labels");

        artifact::save(&self.config.encoder_path, &encoder)?;
        let encoder_fingerprint = encoder.fingerprint()?;
        info!(
            path = %self.config.encoder_path.display(),
            fingerprint = %encoder_fingerprint,
            "Saved feature encoder"
        );

        Ok(TransformationArtifact {
            x_train,
            y_train,
            x_test,
            y_test,
            encoder_path: self.config.encoder_path.clone(),
            encoder_fingerprint,
            label_encoder,
        })
    }
}

fn check_schema(df: &DataFrame, features: &[String]) -> Result<()> {
    let present: Vec<&str> = df.get_column_names().into_iter().map(|name| name.as_str()).collect();
    std::iter::once(TARGET_COLUMN)
        .chain(features.iter().map(String::as_str))
        .find(|column| !present.contains(column))
        .map_or(Ok(()), |column| {
            Err(MushroomError::MissingColumn {
                stage: Stage::Transformation,
                column: column.to_string(),
            })
        })
}
