//! Connection Manager: owns two pooled `sqlx::PgPool`s,
//! LOCAL and REMOTE. Never retries internally — all retry policy lives in
//! [`crate::retry`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::{Config, DbConnectionConfig, PoolConfig};
use crate::error::{Result, SyncError};
use crate::retry::{execute_with_retry, RetryPolicy};

#[derive(Debug, Clone, Copy)]
pub struct HealthStatus {
    pub local_connected: bool,
    pub remote_connected: bool,
    pub last_checked_at: DateTime<Utc>,
}

pub struct ConnectionManager {
    local: PgPool,
    remote: PgPool,
    draining: AtomicBool,
}

impl ConnectionManager {
    /// Builds both pools eagerly. Fails with `SyncError::Connection` if
    /// either side does not come up within `pool.connect_timeout`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let local = Self::build_pool(&config.local, &config.pool, "local").await?;
        let remote = Self::build_pool(&config.remote, &config.pool, "remote").await?;
        Ok(Self {
            local,
            remote,
            draining: AtomicBool::new(false),
        })
    }

    /// Establishes one side's pool under the Connection retry policy (6
    /// attempts, 2s base / 32s cap) — a fresh database coming up slightly
    /// after the daemon shouldn't be a one-shot fatal error at startup.
    async fn build_pool(
        db: &DbConnectionConfig,
        pool: &PoolConfig,
        label: &'static str,
    ) -> Result<PgPool> {
        execute_with_retry(
            || async {
                PgPoolOptions::new()
                    .max_connections(pool.max_connections)
                    .idle_timeout(Some(pool.idle_timeout))
                    .acquire_timeout(pool.connect_timeout)
                    .connect(&db.connection_url())
                    .await
                    .map_err(|e| {
                        SyncError::Connection(format!("failed to connect to {label} database: {e}"))
                    })
            },
            RetryPolicy::CONNECTION,
            label,
        )
        .await
    }

    /// Wraps already-built pools directly — used by integration tests that
    /// stand up ephemeral Postgres databases themselves.
    pub fn from_pools(local: PgPool, remote: PgPool) -> Self {
        Self {
            local,
            remote,
            draining: AtomicBool::new(false),
        }
    }

    pub fn local(&self) -> Result<&PgPool> {
        self.guard_not_draining()?;
        Ok(&self.local)
    }

    pub fn remote(&self) -> Result<&PgPool> {
        self.guard_not_draining()?;
        Ok(&self.remote)
    }

    fn guard_not_draining(&self) -> Result<()> {
        if self.draining.load(Ordering::Acquire) {
            return Err(SyncError::Connection(
                "connection manager is shutting down".into(),
            ));
        }
        Ok(())
    }

    /// Probes both sides with a cheap `SELECT 1`. Never retries or raises;
    /// a failed probe is reported as `false`, not propagated.
    pub async fn health(&self) -> HealthStatus {
        let local_connected = Self::probe(&self.local).await;
        let remote_connected = Self::probe(&self.remote).await;
        HealthStatus {
            local_connected,
            remote_connected,
            last_checked_at: Utc::now(),
        }
    }

    async fn probe(pool: &PgPool) -> bool {
        match tokio::time::timeout(Duration::from_secs(5), sqlx::query("SELECT 1").execute(pool))
            .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "health probe query failed");
                false
            }
            Err(_) => {
                warn!("health probe timed out");
                false
            }
        }
    }

    /// Drains both pools with a timeout, then refuses further acquisitions.
    pub async fn shutdown(&self, timeout: Duration) {
        self.draining.store(true, Ordering::Release);
        let _ = tokio::time::timeout(timeout, async {
            self.local.close().await;
            self.remote.close().await;
        })
        .await;
        info!("connection manager drained");
    }
}

pub type SharedConnectionManager = Arc<ConnectionManager>;
