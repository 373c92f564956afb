//! Integration tests for the GraphRAG HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await - env-dependent tests are serialized
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum_test::TestServer;
use graphrag::api::{
    AppState, HealthResponse, PredictResponse, StatusResponse, create_router,
};
use graphrag_core::features::ensure_relation_features;
use graphrag_core::{KnowledgeGraph, LinkPredictor, ModelConfig, RelationScorer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use std::sync::Mutex;

/// Mutex to serialize tests since the router reads env vars.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("GRAPHRAG_RATE_LIMIT") };
    }
}

fn capitals_predictor() -> LinkPredictor {
    let mut graph = KnowledgeGraph::from_names([
        ("paris", "capital_of", "france"),
        ("berlin", "capital_of", "germany"),
        ("rome", "capital_of", "italy"),
        ("france", "borders", "germany"),
        ("france", "borders", "italy"),
    ])
    .unwrap();
    ensure_relation_features(&mut graph, 8).unwrap();
    let config = ModelConfig {
        embedding_dim: 4,
        init_scale: 0.5,
    };
    let model = RelationScorer::for_graph(&graph, &config, &mut StdRng::seed_from_u64(42)).unwrap();
    LinkPredictor::new(graph, model).unwrap()
}

/// Create a test server with the given rate limit setting.
fn create_server_with_rate_limit(rate_limit: Option<&str>) -> (TestServer, TestGuard) {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe {
        match rate_limit {
            Some(value) => std::env::set_var("GRAPHRAG_RATE_LIMIT", value),
            None => std::env::remove_var("GRAPHRAG_RATE_LIMIT"),
        }
    }
    let router = create_router(AppState::new(capitals_predictor()));
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

fn create_test_server() -> (TestServer, TestGuard) {
    create_server_with_rate_limit(Some("0"))
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_status_reports_graph_and_model() {
    let (server, _guard) = create_test_server();

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.stats.entities, 6);
    assert_eq!(status.stats.relations, 2);
    assert_eq!(status.stats.triplets, 5);
    assert_eq!(status.stats.relations_with_features, 2);
    assert_eq!(status.stats.top_relations[0].relation, "capital_of");
    assert_eq!(status.embedding_dim, 4);
    assert!(status.num_parameters > 0);
}

#[test]
fn test_state_clones_share_predictor() {
    let state = AppState::new(capitals_predictor());
    let handler_copy = state.clone();
    assert!(std::sync::Arc::ptr_eq(&state.predictor, &handler_copy.predictor));
    assert_eq!(handler_copy.predictor.graph().num_entities(), 6);
}

// =============================================================================
// PREDICT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_predict_tail() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/predict")
        .json(&json!({"entity": "paris", "relation": "capital_of", "top_k": 3}))
        .await;

    response.assert_status_ok();
    let result: PredictResponse = response.json();
    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.predictions.len(), 3);
    assert!(
        result
            .predictions
            .windows(2)
            .all(|w| w[0].score >= w[1].score)
    );
}

#[tokio::test]
async fn test_predict_default_top_k_caps_at_entity_count() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/predict")
        .json(&json!({"entity": "paris", "relation": "capital_of"}))
        .await;

    response.assert_status_ok();
    let result: PredictResponse = response.json();
    assert_eq!(result.predictions.len(), 6);
    let known: Vec<&str> = result
        .predictions
        .iter()
        .filter(|p| p.known)
        .map(|p| p.entity.as_str())
        .collect();
    assert_eq!(known, vec!["france"]);
}

#[tokio::test]
async fn test_predict_head_excluding_known() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/predict")
        .json(&json!({
            "entity": "germany",
            "relation": "borders",
            "direction": "head",
            "top_k": 10,
            "exclude_known": true
        }))
        .await;

    response.assert_status_ok();
    let result: PredictResponse = response.json();
    assert_eq!(result.predictions.len(), 5);
    assert!(result.predictions.iter().all(|p| p.entity != "france"));
}

#[tokio::test]
async fn test_predict_unknown_entity() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/predict")
        .json(&json!({"entity": "tokyo", "relation": "capital_of"}))
        .await;

    response.assert_status_bad_request();
    let result: PredictResponse = response.json();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("tokyo"));
}

#[tokio::test]
async fn test_predict_unknown_relation() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/predict")
        .json(&json!({"entity": "paris", "relation": "mayor_of"}))
        .await;

    response.assert_status_bad_request();
    let result: PredictResponse = response.json();
    assert!(!result.success);
}

#[tokio::test]
async fn test_predict_invalid_top_k() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/predict")
        .json(&json!({"entity": "paris", "relation": "capital_of", "top_k": 0}))
        .await;

    response.assert_status_bad_request();
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/unknown").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (server, _guard) = create_test_server();

    // /health is GET only
    let response = server.post("/health").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/predict")
        .text("not valid json")
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
}

// =============================================================================
// RATE LIMIT TESTS
// =============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let (server, _guard) = create_server_with_rate_limit(Some("1"));

    server.get("/health").await.assert_status_ok();
    let response = server.get("/health").await;
    assert_eq!(response.status_code().as_u16(), 429);
}

#[tokio::test]
async fn test_default_rate_limit_allows_normal_traffic() {
    let (server, _guard) = create_server_with_rate_limit(None);

    for _ in 0..5 {
        server.get("/health").await.assert_status_ok();
    }
}
