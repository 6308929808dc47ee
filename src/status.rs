//! Status Reporter: pure read-side of the scheduler and
//! managers. Never retries, never raises — a failed counter read zeroes
//! that field and logs a warning.

use tracing::warn;

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::storage::{meter, reading, tenant};
use crate::sync::types::SyncStatus;

pub struct StatusSnapshot {
    pub is_running: bool,
    pub last_sync_time: Option<chrono::DateTime<chrono::Utc>>,
    pub last_sync_success: Option<bool>,
    pub last_sync_error: Option<String>,
    pub total_records_synced: u64,
}

pub async fn status(connections: &ConnectionManager, scheduler_snapshot: StatusSnapshot) -> SyncStatus {
    let health = connections.health().await;

    let queue_size = match connections.local() {
        Ok(pool) => report(reading::count_backlog(pool).await, "queue_size"),
        Err(_) => None,
    };
    let local_meter_count = match connections.local() {
        Ok(pool) => report(meter::count_local(pool).await, "local_meter_count"),
        Err(_) => None,
    };
    let local_tenant_count = match connections.local() {
        Ok(pool) => report(tenant::count_local(pool).await, "local_tenant_count"),
        Err(_) => None,
    };
    let remote_meter_count = match connections.remote() {
        Ok(pool) => report(meter::count_remote(pool).await, "remote_meter_count"),
        Err(_) => None,
    };
    let remote_tenant_count = match connections.remote() {
        Ok(pool) => report(tenant::count_remote(pool).await, "remote_tenant_count"),
        Err(_) => None,
    };

    SyncStatus {
        is_running: scheduler_snapshot.is_running,
        last_sync_time: scheduler_snapshot.last_sync_time,
        last_sync_success: scheduler_snapshot.last_sync_success,
        last_sync_error: scheduler_snapshot.last_sync_error,
        queue_size: queue_size.unwrap_or(0),
        total_records_synced: scheduler_snapshot.total_records_synced,
        local_meter_count: local_meter_count.unwrap_or(0),
        remote_meter_count: remote_meter_count.unwrap_or(0),
        local_tenant_count: local_tenant_count.unwrap_or(0),
        remote_tenant_count: remote_tenant_count.unwrap_or(0),
        local_db_connected: health.local_connected,
        remote_db_connected: health.remote_connected,
    }
}

fn report(result: Result<i64>, field: &str) -> Option<i64> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(field, error = %err, "status: counter query failed");
            None
        }
    }
}
