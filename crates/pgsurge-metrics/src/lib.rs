//! Metric engine for the pgsurge load generator.
//!
//! Workers report per-operation outcomes into a [`Collector`]; a single
//! consumer polls [`Collector::snapshot`] on a fixed cadence and streams the
//! resulting [`MetricsSnapshot`] records out. Recording is lock-light: the
//! hot path touches only atomics, with a mutex reserved for the rate-limited
//! recent-errors ring.

pub mod collector;
pub mod histogram;
pub mod types;

pub use collector::{Collector, PoolStatsFn};
pub use histogram::{Histogram, HistogramSnapshot};
pub use types::{ErrorEntry, MetricsSnapshot, OperationStats, PoolStats, TotalStats};
