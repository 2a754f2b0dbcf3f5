//! Error types for artifact loading, scoring and the HTTP boundary

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures while loading the fitted artifacts at startup. All of these are fatal.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The artifact file could not be read
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact file is not a valid JSON document of the expected shape
    #[error("Failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The artifact parsed but its contents are unusable
    #[error("Invalid artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    /// Scaler and model were fitted on different feature counts
    #[error("Dimension mismatch: scaler has {scaler} features, model has {model}")]
    DimensionMismatch { scaler: usize, model: usize },
}

/// Failures inside the transform -> scale -> predict pipeline
#[derive(Error, Debug, PartialEq)]
pub enum PredictError {
    /// A stage produced NaN or infinity, e.g. `log1p` of a value <= -1
    #[error("Non-finite features after {stage}")]
    NonFinite { stage: &'static str },

    /// The vector handed to a stage does not match its fitted dimensionality
    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors surfaced to HTTP clients as `{"error": ...}` bodies
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            // Only log1p depends on the client's values; later stages point at the artifacts
            PredictError::NonFinite { stage: "log1p" } => ApiError::Unprocessable(format!(
                "{err}; recency, frequency and monetary must be greater than -1"
            )),
            PredictError::NonFinite { .. } | PredictError::DimensionMismatch { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
