//! Error types for the mushroom classification pipeline

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MushroomError>;

/// Pipeline stage an error originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingestion,
    Transformation,
    ModelSelection,
    ArtifactStore,
    Inference,
    Tracking,
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingestion => "ingestion",
            Stage::Transformation => "transformation",
            Stage::ModelSelection => "model_selection",
            Stage::ArtifactStore => "artifact_store",
            Stage::Inference => "inference",
            Stage::Tracking => "tracking",
            Stage::Config => "config",
        };
        f.write_str(name)
    }
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum MushroomError {
    #[error("[{stage}] data source error: {cause}")]
    DataSource { stage: Stage, cause: String },

    #[error("[{stage}] missing column: {column}")]
    MissingColumn { stage: Stage, column: String },

    #[error("[{stage}] missing field: {field}")]
    MissingField { stage: Stage, field: String },

    #[error("[{stage}] label not seen during fit: {label}")]
    UnseenLabel { stage: Stage, label: String },

    #[error("[{stage}] no acceptable model: best accuracy {best:.4} is below floor {floor:.4}")]
    NoAcceptableModel { stage: Stage, best: f64, floor: f64 },

    #[error("[{stage}] artifact missing: {}", path.display())]
    ArtifactMissing { stage: Stage, path: PathBuf },

    #[error("[{stage}] corrupt artifact {}: {cause}", path.display())]
    CorruptArtifact {
        stage: Stage,
        path: PathBuf,
        cause: String,
    },

    #[error("[{stage}] encoder {encoder} does not match the encoder the model was trained with ({model})")]
    ArtifactMismatch {
        stage: Stage,
        encoder: String,
        model: String,
    },

    #[error("[{stage}] IO error on {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),
}

impl MushroomError {
    /// Stage the error originated in
    pub fn stage(&self) -> Stage {
        match self {
            MushroomError::DataSource { stage, .. }
            | MushroomError::MissingColumn { stage, .. }
            | MushroomError::MissingField { stage, .. }
            | MushroomError::UnseenLabel { stage, .. }
            | MushroomError::NoAcceptableModel { stage, .. }
            | MushroomError::ArtifactMissing { stage, .. }
            | MushroomError::CorruptArtifact { stage, .. }
            | MushroomError::ArtifactMismatch { stage, .. }
            | MushroomError::Io { stage, .. } => *stage,
            MushroomError::Config(_) => Stage::Config,
            MushroomError::ShapeError { .. }
            | MushroomError::ModelNotFitted
            | MushroomError::InvalidParameter { .. }
            | MushroomError::ValidationError(_)
            | MushroomError::TrainingError(_) => Stage::ModelSelection,
        }
    }

    pub(crate) fn io(stage: Stage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MushroomError::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn data_source(stage: Stage, cause: impl fmt::Display) -> Self {
        MushroomError::DataSource {
            stage,
            cause: cause.to_string(),
        }
    }

    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        MushroomError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ndarray::ShapeError> for MushroomError {
    fn from(err: ndarray::ShapeError) -> Self {
        MushroomError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_stage() {
        let err = MushroomError::MissingColumn {
            stage: Stage::Transformation,
            column: "gill-color".to_string(),
        };
        assert_eq!(err.to_string(), "[transformation] missing column: gill-color");
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = MushroomError::io(Stage::ArtifactStore, "/tmp/model.json", io_err);
        assert_eq!(err.stage(), Stage::ArtifactStore);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_model_errors_belong_to_selection() {
        assert_eq!(MushroomError::ModelNotFitted.stage(), Stage::ModelSelection);
        assert_eq!(
            MushroomError::Config("bad".into()).stage(),
            Stage::Config
        );
    }
}
