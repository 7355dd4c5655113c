//! Shared state for the control surface.

use std::sync::Arc;

use tokio::sync::broadcast;

use pgsurge_load::LoadController;
use pgsurge_metrics::{Collector, MetricsSnapshot};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<LoadController>,
    pub collector: Arc<Collector>,
    /// Snapshot stream; the broadcaster publishes here on a fixed cadence
    /// and every WebSocket client holds a subscription.
    pub snapshots: broadcast::Sender<MetricsSnapshot>,
}

impl AppState {
    pub fn new(
        controller: Arc<LoadController>,
        collector: Arc<Collector>,
        snapshots: broadcast::Sender<MetricsSnapshot>,
    ) -> Self {
        Self {
            controller,
            collector,
            snapshots,
        }
    }
}
