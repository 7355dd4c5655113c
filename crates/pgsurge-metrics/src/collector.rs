//! Fan-in point for per-operation outcomes.

use std::fmt::Display;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;

use crate::histogram::Histogram;
use crate::types::{ErrorEntry, MetricsSnapshot, OperationStats, PoolStats, TotalStats};

/// Injected accessor for connection-side statistics.
pub type PoolStatsFn = Box<dyn Fn() -> PoolStats + Send + Sync>;

/// Maximum entries retained in the recent-errors ring.
const RECENT_ERRORS_CAP: usize = 10;

/// Minimum spacing between admitted ring entries. A persistent fault must
/// not swamp the channel and mask error variety; aggregate counters stay
/// exact regardless.
const ERROR_ADMIT_INTERVAL: Duration = Duration::from_secs(10);

struct RecentErrors {
    entries: Vec<ErrorEntry>,
    last_admitted: Option<Instant>,
}

/// Aggregates worker outcomes and produces snapshots on demand.
///
/// Recording is concurrent and lock-light; `snapshot` is the sole consumer
/// and is serialized by its caller.
pub struct Collector {
    read_latencies: Histogram,
    write_latencies: Histogram,

    // Window counters, swapped to zero on every snapshot.
    read_count: AtomicI64,
    write_count: AtomicI64,
    read_errors: AtomicI64,
    write_errors: AtomicI64,

    // Monotonic totals, cleared only by an explicit reset.
    total_queries: AtomicI64,
    total_errors: AtomicI64,

    recent: Mutex<RecentErrors>,
    pool_stats: PoolStatsFn,
    start: Mutex<Instant>,
}

impl Collector {
    pub fn new(pool_stats: PoolStatsFn) -> Self {
        Self {
            read_latencies: Histogram::new(),
            write_latencies: Histogram::new(),
            read_count: AtomicI64::new(0),
            write_count: AtomicI64::new(0),
            read_errors: AtomicI64::new(0),
            write_errors: AtomicI64::new(0),
            total_queries: AtomicI64::new(0),
            total_errors: AtomicI64::new(0),
            recent: Mutex::new(RecentErrors {
                entries: Vec::new(),
                last_admitted: None,
            }),
            pool_stats,
            start: Mutex::new(Instant::now()),
        }
    }

    /// Record one read operation and its outcome.
    pub fn record_read<E: Display>(&self, latency: Duration, error: Option<&E>) {
        self.read_latencies.record(latency);
        self.read_count.fetch_add(1, Ordering::Relaxed);
        self.total_queries.fetch_add(1, Ordering::Relaxed);

        if let Some(err) = error {
            self.read_errors.fetch_add(1, Ordering::Relaxed);
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            self.offer_error(format!("read: {err}"));
        }
    }

    /// Record one write operation and its outcome.
    pub fn record_write<E: Display>(&self, latency: Duration, error: Option<&E>) {
        self.write_latencies.record(latency);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.total_queries.fetch_add(1, Ordering::Relaxed);

        if let Some(err) = error {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            self.offer_error(format!("write: {err}"));
        }
    }

    fn offer_error(&self, message: String) {
        let mut recent = self.recent.lock();

        if let Some(last) = recent.last_admitted {
            if last.elapsed() < ERROR_ADMIT_INTERVAL {
                return;
            }
        }
        recent.last_admitted = Some(Instant::now());

        recent.entries.push(ErrorEntry {
            timestamp: Utc::now().timestamp_millis(),
            message,
        });
        if recent.entries.len() > RECENT_ERRORS_CAP {
            recent.entries.remove(0);
        }
    }

    /// Take an atomic readout: swap-to-zero window counters, drain both
    /// histograms, read totals and pool stats, copy the error ring.
    ///
    /// `interval` is the elapsed wall time the window counters cover; QPS
    /// fields divide by it.
    pub fn snapshot(&self, interval: Duration) -> MetricsSnapshot {
        let read_hist = self.read_latencies.snapshot_and_reset();
        let write_hist = self.write_latencies.snapshot_and_reset();

        let read_count = self.read_count.swap(0, Ordering::Relaxed);
        let write_count = self.write_count.swap(0, Ordering::Relaxed);
        let read_errors = self.read_errors.swap(0, Ordering::Relaxed);
        let write_errors = self.write_errors.swap(0, Ordering::Relaxed);

        let interval_secs = interval.as_secs_f64();
        let (read_qps, write_qps) = if interval_secs > 0.0 {
            (
                read_count as f64 / interval_secs,
                write_count as f64 / interval_secs,
            )
        } else {
            (0.0, 0.0)
        };

        let total_queries = self.total_queries.load(Ordering::Relaxed);
        let total_errors = self.total_errors.load(Ordering::Relaxed);
        let error_rate = if total_queries > 0 {
            total_errors as f64 / total_queries as f64
        } else {
            0.0
        };

        let recent_errors = self.recent.lock().entries.clone();

        MetricsSnapshot {
            timestamp: Utc::now().timestamp_millis(),
            reads: OperationStats {
                qps: read_qps,
                latency_p50_ms: read_hist.p50_ms,
                latency_p99_ms: read_hist.p99_ms,
                latency_avg_ms: read_hist.avg_ms,
                errors: read_errors,
            },
            writes: OperationStats {
                qps: write_qps,
                latency_p50_ms: write_hist.p50_ms,
                latency_p99_ms: write_hist.p99_ms,
                latency_avg_ms: write_hist.avg_ms,
                errors: write_errors,
            },
            totals: TotalStats {
                queries: total_queries,
                errors: total_errors,
                error_rate,
            },
            pool: (self.pool_stats)(),
            recent_errors,
        }
    }

    /// Zero everything, including totals, the error ring, and the uptime
    /// origin.
    pub fn reset(&self) {
        self.read_latencies.snapshot_and_reset();
        self.write_latencies.snapshot_and_reset();
        self.read_count.store(0, Ordering::Relaxed);
        self.write_count.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.write_errors.store(0, Ordering::Relaxed);
        self.total_queries.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        *self.start.lock() = Instant::now();

        let mut recent = self.recent.lock();
        recent.entries.clear();
        recent.last_admitted = None;
    }

    /// Wall time since construction or the last reset.
    pub fn uptime(&self) -> Duration {
        self.start.lock().elapsed()
    }
}
