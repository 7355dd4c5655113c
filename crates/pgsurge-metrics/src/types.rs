//! Wire types for metric snapshots.

use serde::{Deserialize, Serialize};

/// Point-in-time readout of the whole metric engine, suitable for streaming
/// to dashboard subscribers at a fixed cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Milliseconds since the Unix epoch at snapshot time.
    pub timestamp: i64,
    pub reads: OperationStats,
    pub writes: OperationStats,
    pub totals: TotalStats,
    pub pool: PoolStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_errors: Vec<ErrorEntry>,
}

/// A single sampled error with its admission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
}

/// Per-operation-class statistics for one snapshot window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationStats {
    pub qps: f64,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_avg_ms: f64,
    /// Errors observed during this window.
    pub errors: i64,
}

/// Monotonic aggregates, persisted across windows until an explicit reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalStats {
    pub queries: i64,
    pub errors: i64,
    pub error_rate: f64,
}

/// Connection-side statistics as observed at the client boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub active_connections: i64,
    pub idle_connections: i64,
    pub waiting_requests: i64,
    pub database_size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = MetricsSnapshot {
            timestamp: 1_700_000_000_000,
            reads: OperationStats {
                qps: 100.0,
                latency_p50_ms: 1.5,
                latency_p99_ms: 9.0,
                latency_avg_ms: 2.0,
                errors: 0,
            },
            writes: OperationStats::default(),
            totals: TotalStats {
                queries: 500,
                errors: 5,
                error_rate: 0.01,
            },
            pool: PoolStats {
                active_connections: 10,
                ..Default::default()
            },
            recent_errors: Vec::new(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["reads"]["qps"], 100.0);
        assert_eq!(json["totals"]["queries"], 500);
        assert_eq!(json["pool"]["active_connections"], 10);
        // Empty error list is omitted entirely.
        assert!(json.get("recent_errors").is_none());
    }

    #[test]
    fn test_recent_errors_present_when_nonempty() {
        let snapshot = MetricsSnapshot {
            timestamp: 0,
            reads: OperationStats::default(),
            writes: OperationStats::default(),
            totals: TotalStats::default(),
            pool: PoolStats::default(),
            recent_errors: vec![ErrorEntry {
                timestamp: 1,
                message: "read: connect refused".to_string(),
            }],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["recent_errors"][0]["message"], "read: connect refused");
    }
}
