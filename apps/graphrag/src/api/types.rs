//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use graphrag_core::{Direction, GraphragError, KgStats, Prediction, primitives::MAX_TOP_K};
use serde::{Deserialize, Serialize};

/// Default number of candidates when a request omits `top_k`.
pub const DEFAULT_TOP_K: usize = 10;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Knowledge graph status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub stats: KgStats,
    pub embedding_dim: usize,
    pub num_parameters: usize,
}

// =============================================================================
// PREDICT REQUEST/RESPONSE
// =============================================================================

/// Link prediction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub entity: String,
    pub relation: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub exclude_known: bool,
}

impl PredictRequest {
    /// Requested candidate count, validated against `MAX_TOP_K`.
    pub fn top_k(&self) -> Result<usize, GraphragError> {
        let top_k = self.top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(GraphragError::InvalidConfig(format!(
                "top_k must be in 1..={}, got {}",
                MAX_TOP_K, top_k
            )));
        }
        Ok(top_k)
    }
}

/// Link prediction response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub predictions: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictResponse {
    #[must_use]
    pub fn success(predictions: Vec<Prediction>) -> Self {
        Self {
            success: true,
            predictions,
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            predictions: Vec::new(),
            error: Some(message.into()),
        }
    }
}
