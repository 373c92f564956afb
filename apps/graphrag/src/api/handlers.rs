//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{HealthResponse, PredictRequest, PredictResponse, StatusResponse},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Knowledge graph statistics and model shape.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let predictor = &state.predictor;

    let response = StatusResponse {
        stats: predictor.stats(),
        embedding_dim: predictor.model().embedding_dim(),
        num_parameters: predictor.model().num_parameters(),
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// PREDICT HANDLER
// =============================================================================

/// Rank candidates for `(entity, relation, ?)` or `(?, relation, entity)`.
pub async fn predict_handler(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> impl IntoResponse {
    let top_k = match request.top_k() {
        Ok(k) => k,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(PredictResponse::error(format!("Invalid request: {}", e))),
            );
        }
    };

    let predictor = &state.predictor;
    match predictor.predict(
        &request.entity,
        &request.relation,
        request.direction,
        top_k,
        request.exclude_known,
    ) {
        Ok(predictions) => (StatusCode::OK, Json(PredictResponse::success(predictions))),
        Err(e) => {
            tracing::debug!("Prediction rejected: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(PredictResponse::error(format!("Prediction failed: {}", e))),
            )
        }
    }
}
