//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use graphrag::api::{DEFAULT_TOP_K, HealthResponse, PredictRequest, PredictResponse};
use graphrag_core::{Direction, Prediction, primitives::MAX_TOP_K};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// PREDICT REQUEST TESTS
// =============================================================================

#[test]
fn test_predict_request_defaults() {
    let json = r#"{"entity":"paris","relation":"capital_of"}"#;
    let request: PredictRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.direction, Direction::Tail);
    assert!(!request.exclude_known);
    assert_eq!(request.top_k().unwrap(), DEFAULT_TOP_K);
}

#[test]
fn test_predict_request_head_direction() {
    let json = r#"{"entity":"france","relation":"capital_of","direction":"head","top_k":3,"exclude_known":true}"#;
    let request: PredictRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.direction, Direction::Head);
    assert!(request.exclude_known);
    assert_eq!(request.top_k().unwrap(), 3);
}

#[test]
fn test_predict_request_top_k_bounds() {
    let mut request = PredictRequest {
        entity: "paris".to_string(),
        relation: "capital_of".to_string(),
        direction: Direction::Tail,
        top_k: Some(0),
        exclude_known: false,
    };
    assert!(request.top_k().is_err());

    request.top_k = Some(MAX_TOP_K + 1);
    assert!(request.top_k().is_err());

    request.top_k = Some(MAX_TOP_K);
    assert_eq!(request.top_k().unwrap(), MAX_TOP_K);
}

#[test]
fn test_predict_request_unknown_direction_rejected() {
    let json = r#"{"entity":"paris","relation":"capital_of","direction":"sideways"}"#;
    assert!(serde_json::from_str::<PredictRequest>(json).is_err());
}

// =============================================================================
// PREDICT RESPONSE TESTS
// =============================================================================

#[test]
fn test_predict_response_success_omits_error() {
    let response = PredictResponse::success(vec![Prediction {
        entity: "france".to_string(),
        entity_id: 1,
        score: 0.5,
        known: true,
    }]);

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":true"));
    assert!(json.contains("\"entity\":\"france\""));
    assert!(!json.contains("\"error\""));
}

#[test]
fn test_predict_response_error() {
    let response = PredictResponse::error("Unknown entity: tokyo");

    assert!(!response.success);
    assert!(response.predictions.is_empty());
    assert_eq!(response.error.as_deref(), Some("Unknown entity: tokyo"));
}
