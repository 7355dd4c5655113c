//! Load controller: reconciles the declared configuration against the
//! running worker fleet.
//!
//! Connection count, churn rate, and scenario identity are shape-defining:
//! changing any of them while running restarts the fleet. The two QPS
//! fields only retune the shared rate limiters in place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pgsurge_db::ConnectionManager;
use pgsurge_metrics::Collector;
use pgsurge_workload::{Scenario, ScenarioRegistry};

use crate::limiter::RateLimiter;
use crate::worker::{Worker, WorkerKind};

/// Declared load shape. The running fleet is derived from this record
/// alone; workers never mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadConfig {
    pub connections: u32,
    pub read_qps: u32,
    pub write_qps: u32,
    /// Connections churned per second across the whole fleet.
    pub churn_rate: u32,
    pub scenario: String,
    /// Table for the dynamic scenario; empty means auto-discover.
    pub custom_table: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            connections: 0,
            read_qps: 0,
            write_qps: 0,
            churn_rate: 0,
            scenario: "simple".to_string(),
            custom_table: String::new(),
        }
    }
}

struct ControllerState {
    running: bool,
    config: LoadConfig,
    scenario: Arc<dyn Scenario>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

/// Owns the declared config, the two rate limiters, and the active
/// scenario reference.
pub struct LoadController {
    state: RwLock<ControllerState>,
    conn_mgr: Arc<ConnectionManager>,
    collector: Arc<Collector>,
    registry: ScenarioRegistry,
    read_limiter: Arc<RateLimiter>,
    write_limiter: Arc<RateLimiter>,
}

impl LoadController {
    pub fn new(conn_mgr: Arc<ConnectionManager>, collector: Arc<Collector>) -> Self {
        let registry = ScenarioRegistry::new();
        let scenario = registry.get_or_simple("simple");

        Self {
            state: RwLock::new(ControllerState {
                running: false,
                config: LoadConfig::default(),
                scenario,
                cancel: CancellationToken::new(),
                workers: Vec::new(),
            }),
            conn_mgr,
            collector,
            registry,
            read_limiter: Arc::new(RateLimiter::new(100)),
            write_limiter: Arc::new(RateLimiter::new(10)),
        }
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Select the active scenario by name. `"custom"` constructs a fresh
    /// dynamic scenario for `custom_table`; unknown names fall back to the
    /// simple scenario.
    pub async fn set_scenario(&self, name: &str, custom_table: &str) {
        let mut state = self.state.write().await;

        state.scenario = if name == "custom" {
            self.registry.create_dynamic(custom_table)
        } else {
            self.registry.get_or_simple(name)
        };
        state.config.scenario = name.to_string();
        state.config.custom_table = custom_table.to_string();
    }

    /// Install the initial configuration without reconciliation.
    pub async fn set_config(&self, config: LoadConfig) {
        let mut state = self.state.write().await;
        self.retune_limiters(&config);
        state.config = config;
    }

    /// Install a new configuration on a live controller. Rate changes
    /// retune the limiters in place; shape changes (connections, churn,
    /// scenario identity) restart the fleet.
    pub async fn update_config(&self, config: LoadConfig) {
        let needs_restart = {
            let mut state = self.state.write().await;
            let old = state.config.clone();

            self.retune_limiters(&config);

            let scenario_changed = old.scenario != config.scenario
                || old.custom_table != config.custom_table;
            if scenario_changed {
                state.scenario = if config.scenario == "custom" {
                    self.registry.create_dynamic(&config.custom_table)
                } else if !config.scenario.is_empty() {
                    self.registry.get_or_simple(&config.scenario)
                } else {
                    Arc::clone(&state.scenario)
                };
            }

            state.config = config.clone();

            state.running
                && (old.connections != config.connections
                    || old.churn_rate != config.churn_rate
                    || scenario_changed)
        };

        if needs_restart {
            debug!("shape change while running, restarting worker fleet");
            self.stop().await;
            self.start().await;
        }
    }

    fn retune_limiters(&self, config: &LoadConfig) {
        self.read_limiter.set_rate(u64::from(config.read_qps));
        self.write_limiter.set_rate(u64::from(config.write_qps));
    }

    /// Spawn the worker fleet for the current configuration. A second call
    /// without an intervening stop is a no-op.
    pub async fn start(&self) {
        let mut state = self.state.write().await;
        if state.running {
            return;
        }

        let config = state.config.clone();
        let cancel = CancellationToken::new();
        let scenario = Arc::clone(&state.scenario);

        let (readers, writers) = fleet_split(config.connections);
        let churn = churn_per_connection(config.churn_rate, config.connections);

        info!(
            connections = config.connections,
            readers,
            writers,
            churn_rate = config.churn_rate,
            scenario = %scenario.name(),
            "starting worker fleet"
        );

        for _ in 0..readers {
            let worker = Worker::new(
                WorkerKind::Reader,
                Arc::clone(&self.conn_mgr),
                Arc::clone(&self.read_limiter),
                Arc::clone(&self.collector),
                Arc::clone(&scenario),
                churn,
                cancel.clone(),
            );
            state.workers.push(tokio::spawn(worker.run()));
        }
        for _ in 0..writers {
            let worker = Worker::new(
                WorkerKind::Writer,
                Arc::clone(&self.conn_mgr),
                Arc::clone(&self.write_limiter),
                Arc::clone(&self.collector),
                Arc::clone(&scenario),
                churn,
                cancel.clone(),
            );
            state.workers.push(tokio::spawn(worker.run()));
        }

        state.cancel = cancel;
        state.running = true;
    }

    /// Cancel all workers and wait for every one of them to return. A
    /// second call without an intervening start is a no-op.
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if !state.running {
            return;
        }

        state.cancel.cancel();
        let workers = std::mem::take(&mut state.workers);
        let count = workers.len();
        for handle in workers {
            let _ = handle.await;
        }
        state.running = false;

        info!(workers = count, "worker fleet stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    pub async fn config(&self) -> LoadConfig {
        self.state.read().await.config.clone()
    }

    /// The scenario workers would capture on the next start.
    pub async fn scenario_name(&self) -> String {
        self.state.read().await.scenario.name()
    }
}

/// Split the fleet 80/20 reader/writer, with at least one reader whenever
/// any connections are configured.
fn fleet_split(connections: u32) -> (u32, u32) {
    let mut readers = connections * 80 / 100;
    if readers < 1 && connections > 0 {
        readers = 1;
    }
    (readers, connections - readers)
}

/// Per-connection churn rate; zero when either input is zero.
fn churn_per_connection(churn_rate: u32, connections: u32) -> f64 {
    if churn_rate > 0 && connections > 0 {
        f64::from(churn_rate) / f64::from(connections)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_split() {
        assert_eq!(fleet_split(0), (0, 0));
        assert_eq!(fleet_split(1), (1, 0));
        assert_eq!(fleet_split(2), (1, 1));
        assert_eq!(fleet_split(5), (4, 1));
        assert_eq!(fleet_split(10), (8, 2));
        assert_eq!(fleet_split(100), (80, 20));
    }

    #[test]
    fn test_churn_per_connection() {
        assert_eq!(churn_per_connection(0, 10), 0.0);
        assert_eq!(churn_per_connection(100, 0), 0.0);
        assert!((churn_per_connection(100, 1_000) - 0.1).abs() < 1e-12);
        assert!((churn_per_connection(100, 100) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_config() {
        let config = LoadConfig::default();
        assert_eq!(config.connections, 0);
        assert_eq!(config.scenario, "simple");
        assert!(config.custom_table.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = LoadConfig {
            connections: 10,
            read_qps: 100,
            write_qps: 10,
            churn_rate: 0,
            scenario: "simple".to_string(),
            custom_table: String::new(),
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["connections"], 10);
        assert_eq!(json["read_qps"], 100);
        assert_eq!(json["scenario"], "simple");
    }
}
