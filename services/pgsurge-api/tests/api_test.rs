//! Control-surface integration tests.
//!
//! The handlers do not require a reachable database: a state wired to an
//! unreachable URL exercises the same code paths.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tokio::sync::broadcast;
use tower::ServiceExt; // for `oneshot`

use pgsurge_api::{build_router, AppState};
use pgsurge_db::ConnectionManager;
use pgsurge_load::{LoadConfig, LoadController};
use pgsurge_metrics::{Collector, PoolStats};

const UNREACHABLE_URL: &str = "postgres://127.0.0.1:1/nowhere";

fn test_state() -> AppState {
    let conn_mgr = Arc::new(ConnectionManager::new(UNREACHABLE_URL));
    let pool_mgr = Arc::clone(&conn_mgr);
    let collector = Arc::new(Collector::new(Box::new(move || PoolStats {
        active_connections: pool_mgr.active_connections(),
        ..Default::default()
    })));
    let controller = Arc::new(LoadController::new(
        Arc::clone(&conn_mgr),
        Arc::clone(&collector),
    ));
    let (snapshots, _) = broadcast::channel(16);

    AppState::new(controller, collector, snapshots)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_status_reports_config_and_running() {
    let state = test_state();
    state
        .controller
        .set_config(LoadConfig {
            connections: 7,
            read_qps: 70,
            write_qps: 7,
            churn_rate: 0,
            scenario: "simple".to_string(),
            custom_table: String::new(),
        })
        .await;

    let app = build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["running"], false);
    assert_eq!(json["config"]["connections"], 7);
    assert!(json["uptime_seconds"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_scenarios_list_ends_with_custom() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/scenarios")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(response).await;
    let scenarios = json["scenarios"].as_array().unwrap();
    assert_eq!(scenarios.len(), 5);
    assert_eq!(scenarios[0]["name"], "simple");

    let last = scenarios.last().unwrap();
    assert_eq!(last["name"], "custom");
    assert_eq!(last["table_name"], "");
}

#[tokio::test]
async fn test_config_merge_keeps_current_scenario() {
    let state = test_state();
    state.controller.set_scenario("jsonb", "").await;

    let app = build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"connections": 5, "read_qps": 50, "write_qps": 5, "churn_rate": 0}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    // Missing scenario fields keep the current selection.
    assert_eq!(json["config"]["scenario"], "jsonb");
    assert_eq!(json["config"]["connections"], 5);
}

#[tokio::test]
async fn test_config_rejects_malformed_body() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"connections": "many"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_start_stop_reset_round_trip() {
    let state = test_state();
    let controller = Arc::clone(&state.controller);
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/start")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(controller.is_running().await);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stop")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!controller.is_running().await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
}
