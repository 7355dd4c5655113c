//! HTTP and WebSocket control surface for the pgsurge load generator.

pub mod handlers;
pub mod state;
pub mod ws;

pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pgsurge_core::{AppConfig, SurgeError, SurgeResult};
use pgsurge_db::ConnectionManager;
use pgsurge_load::{LoadConfig, LoadController};
use pgsurge_metrics::{Collector, MetricsSnapshot, PoolStats};

/// How often the cached database-size observation is refreshed. Kept well
/// above the snapshot cadence so snapshot assembly never dials out.
const DATABASE_SIZE_REFRESH: Duration = Duration::from_secs(10);

/// Capacity of the snapshot broadcast channel; slow subscribers beyond
/// this skip ahead.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Builds the Axum router for the control surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route("/api/config", post(handlers::update_config))
        .route("/api/start", post(handlers::start))
        .route("/api/stop", post(handlers::stop))
        .route("/api/reset", post(handlers::reset))
        .route("/api/scenarios", get(handlers::scenarios))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Boots the pgsurge control surface and runs until shutdown.
pub async fn run_server(config: AppConfig) -> SurgeResult<()> {
    let conn_mgr = Arc::new(ConnectionManager::new(config.database_url.clone()));

    // Fail fast when the database is unreachable at boot.
    conn_mgr.ping().await?;
    info!("connected to database");

    let pool_mgr = Arc::clone(&conn_mgr);
    let collector = Arc::new(Collector::new(Box::new(move || PoolStats {
        active_connections: pool_mgr.active_connections(),
        idle_connections: 0,
        waiting_requests: 0,
        database_size_bytes: pool_mgr.cached_database_size(),
    })));

    let controller = Arc::new(LoadController::new(
        Arc::clone(&conn_mgr),
        Arc::clone(&collector),
    ));
    controller
        .set_scenario(&config.default_scenario, &config.custom_table)
        .await;
    controller
        .set_config(LoadConfig {
            connections: config.default_connections,
            read_qps: config.default_read_qps,
            write_qps: config.default_write_qps,
            churn_rate: 0,
            scenario: config.default_scenario.clone(),
            custom_table: config.custom_table.clone(),
        })
        .await;

    let (snapshots, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);

    let broadcaster = spawn_broadcaster(
        Arc::clone(&collector),
        snapshots.clone(),
        config.metrics_interval(),
    );
    let size_refresher = spawn_size_refresher(Arc::clone(&conn_mgr));

    let state = AppState::new(Arc::clone(&controller), collector, snapshots);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| SurgeError::internal(format!("failed to bind {addr}: {err}")))?;

    info!(%addr, "pgsurge control surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| SurgeError::internal(format!("server error: {err}")))?;

    info!("shutting down");
    controller.stop().await;
    broadcaster.abort();
    size_refresher.abort();

    Ok(())
}

/// Polls the collector at the configured interval and publishes each
/// snapshot to the broadcast channel.
fn spawn_broadcaster(
    collector: Arc<Collector>,
    snapshots: broadcast::Sender<MetricsSnapshot>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let snapshot = collector.snapshot(interval);
            // No subscribers is fine; snapshots still drain the windows.
            let _ = snapshots.send(snapshot);
        }
    })
}

/// Keeps the connection manager's database-size observation fresh.
fn spawn_size_refresher(conn_mgr: Arc<ConnectionManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DATABASE_SIZE_REFRESH);
        loop {
            ticker.tick().await;
            if let Err(err) = conn_mgr.refresh_database_size().await {
                warn!(error = %err, "database size refresh failed");
            }
        }
    })
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received CTRL+C, shutting down");
        }
        _ = terminate => {
            info!("received SIGTERM, shutting down");
        }
    }
}
