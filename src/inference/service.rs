//! Prediction service
//!
//! Loads the persisted encoder and model envelope, checks that they belong
//! together, and classifies single records.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact;
use crate::config::{PipelineConfig, FEATURE_COLUMNS};
use crate::error::{MushroomError, Result, Stage};
use crate::preprocessing::FeatureEncoder;
use crate::training::ModelArtifact;

/// One mushroom to classify. Field names on the wire use the dataset's
/// hyphenated column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MushroomRecord {
    #[serde(default)]
    pub bruises: Option<String>,
    #[serde(default, rename = "gill-spacing", alias = "gill_spacing")]
    pub gill_spacing: Option<String>,
    #[serde(default, rename = "gill-size", alias = "gill_size")]
    pub gill_size: Option<String>,
    #[serde(default, rename = "gill-color", alias = "gill_color")]
    pub gill_color: Option<String>,
    #[serde(default, rename = "stalk-root", alias = "stalk_root")]
    pub stalk_root: Option<String>,
    #[serde(default, rename = "ring-type", alias = "ring_type")]
    pub ring_type: Option<String>,
    #[serde(default, rename = "spore-print-color", alias = "spore_print_color")]
    pub spore_print_color: Option<String>,
}

impl MushroomRecord {
    /// Record with every attribute set, in column order
    pub fn from_values(values: [&str; 7]) -> Self {
        let [bruises, gill_spacing, gill_size, gill_color, stalk_root, ring_type, spore_print_color] =
            values.map(|v| Some(v.to_string()));
        Self {
            bruises,
            gill_spacing,
            gill_size,
            gill_color,
            stalk_root,
            ring_type,
            spore_print_color,
        }
    }

    /// Attribute by its dataset column name
    pub fn get(&self, column: &str) -> Option<&str> {
        let value = match column {
            "bruises" => &self.bruises,
            "gill-spacing" => &self.gill_spacing,
            "gill-size" => &self.gill_size,
            "gill-color" => &self.gill_color,
            "stalk-root" => &self.stalk_root,
            "ring-type" => &self.ring_type,
            "spore-print-color" => &self.spore_print_color,
            _ => return None,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Set an attribute by its dataset column name
    pub fn set(&mut self, column: &str, value: impl Into<String>) -> Result<()> {
        let slot = match column {
            "bruises" => &mut self.bruises,
            "gill-spacing" => &mut self.gill_spacing,
            "gill-size" => &mut self.gill_size,
            "gill-color" => &mut self.gill_color,
            "stalk-root" => &mut self.stalk_root,
            "ring-type" => &mut self.ring_type,
            "spore-print-color" => &mut self.spore_print_color,
            other => {
                return Err(MushroomError::MissingColumn {
                    stage: Stage::Inference,
                    column: other.to_string(),
                })
            }
        };
        *slot = Some(value.into());
        Ok(())
    }

    /// Values for `columns` in that order; an absent or blank attribute is
    /// reported by name
    pub fn values_for<'a, S: AsRef<str>>(&'a self, columns: &[S]) -> Result<Vec<&'a str>> {
        columns
            .iter()
            .map(|column| {
                let column = column.as_ref();
                self.get(column).ok_or_else(|| MushroomError::MissingField {
                    stage: Stage::Inference,
                    field: column.to_string(),
                })
            })
            .collect()
    }

    /// Check that every feature attribute is present
    pub fn validate(&self) -> Result<()> {
        self.values_for(&FEATURE_COLUMNS[..]).map(|_| ())
    }
}

/// Predicted class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Edible,
    Poisonous,
}

impl Prediction {
    /// Class index 0 is edible, 1 is poisonous
    pub fn from_class(class: f64) -> Result<Self> {
        if class == 0.0 {
            Ok(Prediction::Edible)
        } else if class == 1.0 {
            Ok(Prediction::Poisonous)
        } else {
            Err(MushroomError::ValidationError(format!(
                "model produced unknown class index {}",
                class
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Edible => "edible",
            Prediction::Poisonous => "poisonous",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loaded encoder and model pair
#[derive(Debug, Clone)]
pub struct PredictionService {
    encoder: FeatureEncoder,
    model: ModelArtifact,
}

impl PredictionService {
    /// Load both artifacts named by `config`
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let encoder: FeatureEncoder = artifact::load(&config.encoder_path)?;
        let model: ModelArtifact = artifact::load(&config.model_path)?;
        let service = Self::from_parts(encoder, model)?;
        info!(
            model = %service.model.name,
            accuracy = service.model.accuracy,
            "Loaded prediction artifacts"
        );
        Ok(service)
    }

    /// Pair an encoder with a model, rejecting a model trained against a
    /// different encoder
    pub fn from_parts(encoder: FeatureEncoder, model: ModelArtifact) -> Result<Self> {
        let fingerprint = encoder.fingerprint()?;
        if fingerprint != model.encoder_fingerprint {
            return Err(MushroomError::ArtifactMismatch {
                stage: Stage::Inference,
                encoder: fingerprint,
                model: model.encoder_fingerprint,
            });
        }
        Ok(Self { encoder, model })
    }

    /// Validate, encode and classify one record
    pub fn predict(&self, record: &MushroomRecord) -> Result<Prediction> {
        let values = record.values_for(self.encoder.columns())?;
        let x = self.encoder.transform_values(&values)?;
        let classes = self.model.predict(&x)?;
        let class = classes.first().copied().ok_or_else(|| {
            MushroomError::ValidationError("model returned no prediction".to_string())
        })?;
        let prediction = Prediction::from_class(class)?;
        debug!(prediction = %prediction, "Record classified");
        Ok(prediction)
    }

    pub fn model(&self) -> &ModelArtifact {
        &self.model
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }
}

/// Validate the record, then load the artifacts and predict. A record with
/// a missing attribute fails without touching the artifact files.
pub fn predict_once(config: &PipelineConfig, record: &MushroomRecord) -> Result<Prediction> {
    record.validate()?;
    PredictionService::load(config)?.predict(record)
}
