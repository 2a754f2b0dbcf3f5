//! HTTP routes for the segmentation service

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::data::RfmFeatures;
use crate::error::ApiError;
use crate::model::Segmenter;

/// Read-only state shared by every request
pub type SharedState = Arc<Segmenter>;

pub const ROOT_MESSAGE: &str = "RFM API is running successfully!";

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub cluster: usize,
    /// The request object exactly as received
    pub input_data: Value,
}

/// GET / - Service banner
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: ROOT_MESSAGE.to_string(),
    })
}

/// GET /health, GET /ping - Liveness only, no dependency checks
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// POST /predict, POST /invocations - Assign a customer to a segment.
///
/// The body is parsed as JSON whatever its content type.
pub async fn predict(
    State(segmenter): State<SharedState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let input: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejected predict request: invalid JSON: {}", e);
        ApiError::BadRequest(format!("Request body must be valid JSON: {}", e))
    })?;

    let features = RfmFeatures::from_json(&input).map_err(|e| {
        warn!("Rejected predict request: {}", e);
        ApiError::BadRequest(e.to_string())
    })?;

    let cluster = segmenter.predict(&features).map_err(|e| {
        let api_error = ApiError::from(e);
        match api_error {
            ApiError::Internal(_) => error!("Prediction failed: {}", api_error),
            _ => warn!("Rejected predict request {:?}: {}", features, api_error),
        }
        api_error
    })?;

    debug!("Assigned {:?} to cluster {}", features, cluster);

    Ok(Json(PredictResponse {
        cluster,
        input_data: input,
    }))
}

/// Build the router with every route of both deployment shapes mounted
pub fn router(segmenter: SharedState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ping", get(health_check))
        .route("/predict", post(predict))
        .route("/invocations", post(predict))
        .with_state(segmenter)
        .layer(TraceLayer::new_for_http())
}
