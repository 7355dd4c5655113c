//! HTTP handlers for the control surface.
//!
//! Malformed request bodies are rejected by axum's JSON extractor before
//! they reach the core; handlers only see well-formed requests.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use pgsurge_load::LoadConfig;
use pgsurge_workload::ScenarioInfo;

use crate::state::AppState;

/// Response for `GET /api/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub config: LoadConfig,
    pub uptime_seconds: f64,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.controller.is_running().await,
        config: state.controller.config().await,
        uptime_seconds: state.collector.uptime().as_secs_f64(),
    })
}

/// Request body for `POST /api/config`. Missing scenario fields mean
/// "keep current".
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub connections: u32,
    pub read_qps: u32,
    pub write_qps: u32,
    pub churn_rate: u32,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub custom_table: Option<String>,
}

/// Response for `POST /api/config`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub ok: bool,
    pub config: LoadConfig,
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(req): Json<ConfigRequest>,
) -> Json<ConfigResponse> {
    let current = state.controller.config().await;

    let scenario = match req.scenario {
        Some(name) if !name.is_empty() => name,
        _ => current.scenario.clone(),
    };
    // An absent table keeps the current one only while the scenario is
    // unchanged; a scenario switch with no table means auto-discover.
    let custom_table = match req.custom_table {
        Some(table) if !table.is_empty() => table,
        _ if scenario == current.scenario => current.custom_table.clone(),
        _ => String::new(),
    };

    state
        .controller
        .update_config(LoadConfig {
            connections: req.connections,
            read_qps: req.read_qps,
            write_qps: req.write_qps,
            churn_rate: req.churn_rate,
            scenario,
            custom_table,
        })
        .await;

    Json(ConfigResponse {
        ok: true,
        config: state.controller.config().await,
    })
}

/// Generic acknowledgement response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: String,
}

pub async fn start(State(state): State<AppState>) -> Json<MessageResponse> {
    state.controller.start().await;
    Json(MessageResponse {
        ok: true,
        message: "Load generator started".to_string(),
    })
}

pub async fn stop(State(state): State<AppState>) -> Json<MessageResponse> {
    state.controller.stop().await;
    Json(MessageResponse {
        ok: true,
        message: "Load generator stopped".to_string(),
    })
}

pub async fn reset(State(state): State<AppState>) -> Json<MessageResponse> {
    state.collector.reset();
    Json(MessageResponse {
        ok: true,
        message: "Metrics reset".to_string(),
    })
}

/// Response for `GET /api/scenarios`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScenariosResponse {
    pub scenarios: Vec<ScenarioInfo>,
}

pub async fn scenarios(State(state): State<AppState>) -> Json<ScenariosResponse> {
    let mut scenarios = state.controller.registry().list();

    // The synthetic entry for the dynamic scenario always closes the list.
    scenarios.push(ScenarioInfo {
        name: "custom".to_string(),
        description: "Custom table (optionally specify table name)".to_string(),
        table_name: String::new(),
    });

    Json(ScenariosResponse { scenarios })
}

pub async fn health() -> &'static str {
    "ok"
}
