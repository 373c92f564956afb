//! # GraphRAG HTTP API Module
//!
//! HTTP retrieval server over a pretrained link-prediction model, using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Knowledge graph statistics and model shape
//! - `POST /predict` - Top-k link prediction
//!
//! ## Configuration (Environment Variables)
//!
//! - `GRAPHRAG_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `GRAPHRAG_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod handlers;
mod middleware;
mod types;

pub use handlers::{health_handler, predict_handler, status_handler};
pub use middleware::{
    DEFAULT_RATE_LIMIT, create_rate_limiter, get_rate_limit_from_env, parse_rate_limit,
};
pub use types::{DEFAULT_TOP_K, HealthResponse, PredictRequest, PredictResponse, StatusResponse};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use graphrag_core::{GraphragError, LinkPredictor};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (64 KB).
const MAX_BODY_SIZE: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the predictor.
///
/// The predictor is read-only once loaded, so handlers share it without a
/// lock.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<LinkPredictor>,
}

impl AppState {
    #[must_use]
    pub fn new(predictor: LinkPredictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `GRAPHRAG_CORS_ORIGINS`.
///
/// - `"*"`: allows all origins
/// - unset, or no valid origin listed: localhost only
/// - otherwise: the comma-separated list of origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("GRAPHRAG_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (GRAPHRAG_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in GRAPHRAG_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No GRAPHRAG_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, then rate
/// limiting when enabled.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/predict", post(handlers::predict_handler));

    if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `predictor` on `addr` until Ctrl+C.
pub async fn run_server(addr: &str, predictor: LinkPredictor) -> Result<(), GraphragError> {
    let router = create_router(AppState::new(predictor));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GraphragError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("GraphRAG retrieval server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .map_err(|e| GraphragError::IoError(format!("Server error: {}", e)))
}
