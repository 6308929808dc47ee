//! Per-tenant batch-size configuration, with graceful fallback to defaults.

use tracing::warn;

use crate::connection::ConnectionManager;
use crate::models::TenantBatchConfig;
use crate::storage::tenant;

pub struct TenantConfigLoader<'a> {
    connections: &'a ConnectionManager,
}

impl<'a> TenantConfigLoader<'a> {
    pub fn new(connections: &'a ConnectionManager) -> Self {
        Self { connections }
    }

    /// Returns `{1000, 100}` when the tenant row is missing or the
    /// configuration columns are absent.
    pub async fn batch_config(&self, tenant_id: i64) -> TenantBatchConfig {
        match self.connections.local() {
            Ok(pool) => match tenant::batch_config(pool, tenant_id).await {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!(tenant_id, error = %err, "failed to load tenant batch config, using defaults");
                    TenantBatchConfig::default()
                }
            },
            Err(err) => {
                warn!(tenant_id, error = %err, "LOCAL unreachable while loading tenant batch config");
                TenantBatchConfig::default()
            }
        }
    }

    /// The single tenant this daemon serves, read from LOCAL.
    pub async fn local_tenant_id(&self) -> Option<i64> {
        match self.connections.local() {
            Ok(pool) => match tenant::local_tenant_id(pool).await {
                Ok(id) => id,
                Err(err) => {
                    warn!(error = %err, "failed to read local tenant id");
                    None
                }
            },
            Err(_) => None,
        }
    }
}
