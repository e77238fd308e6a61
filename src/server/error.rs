//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::MushroomError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Pipeline(#[from] MushroomError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Pipeline(MushroomError::MissingField { .. })
            | ServerError::Pipeline(MushroomError::MissingColumn { .. }) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(MushroomError::ArtifactMissing { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client
    pub fn public_message(&self) -> String {
        match self {
            ServerError::Pipeline(MushroomError::MissingField { field, .. }) => {
                format!("Missing field: {}", field)
            }
            ServerError::Pipeline(MushroomError::ArtifactMissing { .. }) => {
                "No trained model is available yet".to_string()
            }
            _ => "Prediction failed. Check server logs for details.".to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(detail = %self, "Prediction request failed");
        }

        let body = Json(json!({
            "error": true,
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        let missing = ServerError::from(MushroomError::MissingField {
            stage: Stage::Inference,
            field: "ring-type".to_string(),
        });
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.public_message(), "Missing field: ring-type");

        let absent = ServerError::from(MushroomError::ArtifactMissing {
            stage: Stage::ArtifactStore,
            path: PathBuf::from("model.json"),
        });
        assert_eq!(absent.status(), StatusCode::SERVICE_UNAVAILABLE);

        let other = ServerError::from(MushroomError::ModelNotFitted);
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
