//! Workers: each owns one connection at a time, paces queries through the
//! shared rate limiter, and churns the connection on schedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_distr::Exp1;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tokio_util::sync::CancellationToken;

use pgsurge_core::SurgeResult;
use pgsurge_db::ConnectionManager;
use pgsurge_metrics::Collector;
use pgsurge_workload::Scenario;

use crate::limiter::RateLimiter;

/// Sleep after a failed connect or initialize before retrying.
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

/// Connection lifetime clamps; the exponential draw is bounded so churn
/// never produces pathological short or long tails.
const MIN_LIFETIME: Duration = Duration::from_millis(100);
const MAX_LIFETIME: Duration = Duration::from_secs(60);

/// Which operation class this worker drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerKind {
    Reader,
    Writer,
}

pub(crate) struct Worker {
    kind: WorkerKind,
    conn_mgr: Arc<ConnectionManager>,
    limiter: Arc<RateLimiter>,
    collector: Arc<Collector>,
    scenario: Arc<dyn Scenario>,
    /// Expected churn events per second for this one connection; zero
    /// disables churn.
    churn_rate: f64,
    cancel: CancellationToken,
}

impl Worker {
    pub(crate) fn new(
        kind: WorkerKind,
        conn_mgr: Arc<ConnectionManager>,
        limiter: Arc<RateLimiter>,
        collector: Arc<Collector>,
        scenario: Arc<dyn Scenario>,
        churn_rate: f64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            kind,
            conn_mgr,
            limiter,
            collector,
            scenario,
            churn_rate,
            cancel,
        }
    }

    /// Outer lifecycle loop: acquire a connection, initialize the scenario
    /// once, run paced queries until churn, close, repeat. Exits on
    /// cancellation.
    pub(crate) async fn run(self) {
        let mut initialized = false;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let connect = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.conn_mgr.connect() => result,
            };

            let mut conn = match connect {
                Ok(conn) => conn,
                Err(err) => {
                    // Shutdown noise is not an error worth recording.
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    self.record(Duration::ZERO, Some(&err));
                    if !self.backoff().await {
                        return;
                    }
                    continue;
                }
            };

            if !initialized {
                let init = tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    result = self.scenario.initialize(&mut conn) => Some(result),
                };
                match init {
                    None => {
                        self.retire(conn).await;
                        return;
                    }
                    Some(Err(err)) => {
                        self.record(Duration::ZERO, Some(&err));
                        self.retire(conn).await;
                        if !self.backoff().await {
                            return;
                        }
                        continue;
                    }
                    Some(Ok(())) => initialized = true,
                }
            }

            self.run_with_connection(&mut conn).await;
            self.retire(conn).await;
        }
    }

    /// Inner loop on one connection: obey cancellation, honor the churn
    /// deadline, pace through the limiter, execute one operation at a time.
    async fn run_with_connection(&self, conn: &mut PgConnection) {
        let churn_deadline = self.churn_deadline();

        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            if let Some(deadline) = churn_deadline {
                if Instant::now() >= deadline {
                    return;
                }
            }

            if !self.limiter.wait(&self.cancel).await {
                return;
            }

            let start = Instant::now();
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => None,
                result = self.execute(conn) => Some(result),
            };
            let Some(result) = outcome else {
                return;
            };
            let latency = start.elapsed();

            match result {
                Ok(()) => self.record(latency, None),
                Err(err) => {
                    // Errors surfaced by shutdown are expected; anything
                    // else is recorded with its measured latency.
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    self.record(latency, Some(&err));
                }
            }
        }
    }

    async fn execute(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        match self.kind {
            WorkerKind::Reader => self.scenario.execute_read(conn).await,
            WorkerKind::Writer => self.scenario.execute_write(conn).await,
        }
    }

    fn record(&self, latency: Duration, error: Option<&pgsurge_core::SurgeError>) {
        match self.kind {
            WorkerKind::Reader => self.collector.record_read(latency, error),
            WorkerKind::Writer => self.collector.record_write(latency, error),
        }
    }

    fn churn_deadline(&self) -> Option<Instant> {
        if self.churn_rate > 0.0 {
            Some(Instant::now() + sample_lifetime(self.churn_rate))
        } else {
            None
        }
    }

    /// Close the connection outside the cancellation scope and give the
    /// handle back.
    async fn retire(&self, conn: PgConnection) {
        let _ = conn.close().await;
        self.conn_mgr.release();
    }

    /// Cancellable backoff; returns `false` when cancelled.
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(CONNECT_BACKOFF) => true,
        }
    }
}

/// Draw a connection lifetime from an exponential distribution with mean
/// `1 / churn_rate`, clamped to `[100 ms, 60 s]`.
pub(crate) fn sample_lifetime(churn_rate: f64) -> Duration {
    let unit: f64 = rand::thread_rng().sample(Exp1);
    let secs = (unit / churn_rate).clamp(
        MIN_LIFETIME.as_secs_f64(),
        MAX_LIFETIME.as_secs_f64(),
    );
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifetime_respects_clamps() {
        for _ in 0..10_000 {
            let lifetime = sample_lifetime(10.0);
            assert!(lifetime >= MIN_LIFETIME);
            assert!(lifetime <= MAX_LIFETIME);
        }
    }

    #[test]
    fn test_lifetime_mean_tracks_rate() {
        let samples = 20_000;
        let total: f64 = (0..samples)
            .map(|_| sample_lifetime(2.0).as_secs_f64())
            .sum();
        let mean = total / samples as f64;
        // Mean of Exp(1)/2 is 0.5 s; the lower clamp pulls it up slightly.
        assert!(mean > 0.3, "mean {mean} too small");
        assert!(mean < 0.8, "mean {mean} too large");
    }

    #[test]
    fn test_high_churn_hits_lower_clamp() {
        // At 1000 events/s the raw draw is almost always below 100 ms.
        let lifetime = sample_lifetime(1_000.0);
        assert!(lifetime >= MIN_LIFETIME);
    }
}
