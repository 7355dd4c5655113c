//! Single-use Postgres connections for the worker fleet.
//!
//! No pooling happens here on purpose: the pooling under test lives behind
//! the connection URL. The manager only opens fresh connections and counts
//! outstanding handles; workers own connection lifetimes.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use pgsurge_core::{SurgeError, SurgeResult};
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use tracing::{info, warn};

/// Opens fresh connections and tracks outstanding handles.
pub struct ConnectionManager {
    database_url: String,
    active_connections: AtomicI64,
    total_created: AtomicU64,
    total_failed: AtomicU64,
    /// Most recent database size observation, refreshed out of band so
    /// snapshot assembly never dials the database.
    database_size: AtomicI64,
}

impl ConnectionManager {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            active_connections: AtomicI64::new(0),
            total_created: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            database_size: AtomicI64::new(0),
        }
    }

    /// Open a new direct connection.
    ///
    /// On success the active-handle count is incremented; the caller must
    /// pair every successful `connect` with one [`release`](Self::release)
    /// after closing the connection.
    pub async fn connect(&self) -> SurgeResult<PgConnection> {
        match PgConnection::connect(&self.database_url).await {
            Ok(conn) => {
                self.active_connections.fetch_add(1, Ordering::Relaxed);
                let created = self.total_created.fetch_add(1, Ordering::Relaxed) + 1;
                if created % 1_000 == 0 {
                    info!(
                        active = self.active_connections.load(Ordering::Relaxed),
                        total_created = created,
                        total_failed = self.total_failed.load(Ordering::Relaxed),
                        "connection milestone"
                    );
                }
                Ok(conn)
            }
            Err(err) => {
                let failed = self.total_failed.fetch_add(1, Ordering::Relaxed) + 1;
                // One log line per 100 consecutive failures keeps a dead
                // pooler from flooding the log.
                if failed % 100 == 1 {
                    warn!(total_failed = failed, error = %err, "connection failed");
                }
                Err(SurgeError::Connect(err))
            }
        }
    }

    /// Decrement the outstanding-handle count. Call after closing a
    /// connection obtained from [`connect`](Self::connect).
    pub fn release(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Number of handles currently held by workers.
    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Total connections ever opened.
    pub fn total_created(&self) -> u64 {
        self.total_created.load(Ordering::Relaxed)
    }

    /// Total failed connection attempts.
    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::Relaxed)
    }

    /// Verify connectivity by opening and pinging a throwaway connection.
    pub async fn ping(&self) -> SurgeResult<()> {
        let mut conn = PgConnection::connect(&self.database_url)
            .await
            .map_err(SurgeError::Connect)?;
        let result = conn.ping().await;
        let _ = conn.close().await;
        result.map_err(SurgeError::Query)
    }

    /// Query the current database size and cache the observation.
    pub async fn refresh_database_size(&self) -> SurgeResult<i64> {
        let mut conn = PgConnection::connect(&self.database_url)
            .await
            .map_err(SurgeError::Connect)?;
        let result = sqlx::query("SELECT pg_database_size(current_database())")
            .fetch_one(&mut conn)
            .await;
        let _ = conn.close().await;

        let size: i64 = result?.try_get(0)?;
        self.database_size.store(size, Ordering::Relaxed);
        Ok(size)
    }

    /// Last observed database size in bytes (zero until the first refresh).
    pub fn cached_database_size(&self) -> i64 {
        self.database_size.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens on port 1, so connect attempts fail fast.
    const UNREACHABLE_URL: &str = "postgres://127.0.0.1:1/nowhere";

    #[tokio::test]
    async fn test_failed_connect_counts_failure_not_active() {
        let mgr = ConnectionManager::new(UNREACHABLE_URL);

        let result = mgr.connect().await;
        assert!(result.is_err());
        assert_eq!(mgr.active_connections(), 0);
        assert_eq!(mgr.total_created(), 0);
        assert_eq!(mgr.total_failed(), 1);
    }

    #[tokio::test]
    async fn test_release_decrements() {
        let mgr = ConnectionManager::new(UNREACHABLE_URL);
        // Release pairs with connect in the worker loop; the counter itself
        // is just arithmetic.
        mgr.active_connections.store(2, Ordering::Relaxed);
        mgr.release();
        assert_eq!(mgr.active_connections(), 1);
    }

    #[tokio::test]
    async fn test_ping_unreachable_errors() {
        let mgr = ConnectionManager::new(UNREACHABLE_URL);
        assert!(mgr.ping().await.is_err());
        assert_eq!(mgr.cached_database_size(), 0);
    }
}
