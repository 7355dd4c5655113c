//! Fixed-bucket latency histogram with atomic recording.
//!
//! Recording touches one bucket counter plus a running count and sum, all
//! atomics, so any number of workers can record without coordination.
//! `snapshot_and_reset` is the single-reader side: it swaps every cell to
//! zero and computes percentiles from the captured values. A record that
//! races a snapshot lands in either the closing window or the next one;
//! no event is lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Bucket upper bounds in microseconds, 100 us through 60 s. Values above
/// the last bound land in an overflow bucket.
const BUCKET_BOUNDS_US: &[u64] = &[
    100,
    250,
    500,
    1_000,
    2_500,
    5_000,
    10_000,
    25_000,
    50_000,
    100_000,
    250_000,
    500_000,
    1_000_000,
    2_500_000,
    5_000_000,
    10_000_000,
    30_000_000,
    60_000_000,
];

/// Latency accumulator for one operation class over one snapshot window.
pub struct Histogram {
    /// One counter per bound plus an overflow slot.
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_us: AtomicU64,
}

/// Result of draining a histogram window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramSnapshot {
    pub p50_ms: f64,
    pub p99_ms: f64,
    pub avg_ms: f64,
    pub count: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            buckets: (0..=BUCKET_BOUNDS_US.len())
                .map(|_| AtomicU64::new(0))
                .collect(),
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
        }
    }

    /// Record one observed latency. Safe under unsynchronized concurrent
    /// callers.
    pub fn record(&self, latency: Duration) {
        let us = latency.as_micros() as u64;
        let idx = BUCKET_BOUNDS_US
            .iter()
            .position(|&bound| us <= bound)
            .unwrap_or(BUCKET_BOUNDS_US.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
    }

    /// Drain the current window and return its percentiles and average.
    ///
    /// Callers serialize snapshots (one reader); recording never blocks.
    pub fn snapshot_and_reset(&self) -> HistogramSnapshot {
        let counts: Vec<u64> = self
            .buckets
            .iter()
            .map(|b| b.swap(0, Ordering::Relaxed))
            .collect();
        let count = self.count.swap(0, Ordering::Relaxed);
        let sum_us = self.sum_us.swap(0, Ordering::Relaxed);

        // Ranks come from the bucket capture; count/sum feed the average.
        // The two may differ by in-flight records, which is acceptable.
        let total: u64 = counts.iter().sum();

        let avg_ms = if count > 0 {
            sum_us as f64 / count as f64 / 1_000.0
        } else {
            0.0
        };

        HistogramSnapshot {
            p50_ms: percentile_ms(&counts, total, 0.50),
            p99_ms: percentile_ms(&counts, total, 0.99),
            avg_ms,
            count,
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk buckets in order and return the midpoint of the bucket containing
/// the target rank, in milliseconds. Empty capture yields zero.
fn percentile_ms(counts: &[u64], total: u64, p: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let rank = ((total as f64 * p).ceil() as u64).max(1);
    let mut seen = 0u64;
    for (idx, &c) in counts.iter().enumerate() {
        seen += c;
        if seen >= rank {
            return bucket_midpoint_us(idx) / 1_000.0;
        }
    }
    bucket_midpoint_us(counts.len() - 1) / 1_000.0
}

fn bucket_midpoint_us(idx: usize) -> f64 {
    if idx == 0 {
        BUCKET_BOUNDS_US[0] as f64 / 2.0
    } else if idx < BUCKET_BOUNDS_US.len() {
        (BUCKET_BOUNDS_US[idx - 1] + BUCKET_BOUNDS_US[idx]) as f64 / 2.0
    } else {
        // Overflow bucket: report the last bound.
        BUCKET_BOUNDS_US[BUCKET_BOUNDS_US.len() - 1] as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_histogram_is_zero() {
        let hist = Histogram::new();
        let snap = hist.snapshot_and_reset();
        assert_eq!(snap.p50_ms, 0.0);
        assert_eq!(snap.p99_ms, 0.0);
        assert_eq!(snap.avg_ms, 0.0);
        assert_eq!(snap.count, 0);
    }

    #[test]
    fn test_average_matches_sum() {
        let hist = Histogram::new();
        hist.record(Duration::from_millis(1));
        hist.record(Duration::from_millis(2));
        hist.record(Duration::from_millis(3));

        let snap = hist.snapshot_and_reset();
        assert_eq!(snap.count, 3);
        assert!((snap.avg_ms - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_is_bucket_midpoint() {
        let hist = Histogram::new();
        // 1 ms falls in the (500 us, 1000 us] bucket, midpoint 750 us.
        for _ in 0..100 {
            hist.record(Duration::from_millis(1));
        }

        let snap = hist.snapshot_and_reset();
        assert!((snap.p50_ms - 0.75).abs() < 1e-9);
        assert!((snap.p99_ms - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_p99_separates_tail() {
        let hist = Histogram::new();
        // 99 fast records, 1 slow one.
        for _ in 0..99 {
            hist.record(Duration::from_micros(200));
        }
        hist.record(Duration::from_secs(2));

        let snap = hist.snapshot_and_reset();
        // p50 in the (100, 250] bucket, midpoint 175 us.
        assert!((snap.p50_ms - 0.175).abs() < 1e-9);
        // p99 rank is 99 of 100, still within the fast bucket.
        assert!((snap.p99_ms - 0.175).abs() < 1e-9);
    }

    #[test]
    fn test_overflow_bucket() {
        let hist = Histogram::new();
        hist.record(Duration::from_secs(120));

        let snap = hist.snapshot_and_reset();
        assert_eq!(snap.p50_ms, 60_000.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let hist = Histogram::new();
        hist.record(Duration::from_millis(5));
        let first = hist.snapshot_and_reset();
        assert_eq!(first.count, 1);

        let second = hist.snapshot_and_reset();
        assert_eq!(second.count, 0);
        assert_eq!(second.avg_ms, 0.0);
    }

    #[test]
    fn test_concurrent_records() {
        let hist = Arc::new(Histogram::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let hist = Arc::clone(&hist);
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    hist.record(Duration::from_millis(1));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = hist.snapshot_and_reset();
        assert_eq!(snap.count, 4_000);
        assert!((snap.avg_ms - 1.0).abs() < 1e-9);
    }
}
