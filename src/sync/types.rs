//! Result and status types shared across the sync managers and scheduler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct UploadResult {
    pub success: bool,
    pub records_uploaded: u64,
    pub records_deleted: u64,
    pub error: Option<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct MeterSyncResult {
    pub success: bool,
    pub new_meters: usize,
    pub updated_meters: usize,
    pub total_meters: usize,
    pub new_meter_ids: Vec<i64>,
    pub updated_meter_ids: Vec<i64>,
    pub error: Option<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct TenantChange {
    pub tenant_id: i64,
    pub changed_fields: Vec<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct TenantSyncResult {
    pub success: bool,
    pub new_tenants: usize,
    pub updated_tenants: usize,
    pub total_tenants: usize,
    pub new_tenant_ids: Vec<i64>,
    pub updated_tenant_ids: Vec<i64>,
    pub tenant_changes: Vec<TenantChange>,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Aggregate result of one scheduler cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    pub success: bool,
    pub upload: Option<UploadResult>,
    pub meters: Option<MeterSyncResult>,
    pub tenant: Option<TenantSyncResult>,
    pub duration: Duration,
}

impl SyncCycleResult {
    /// Total rows moved in this cycle, fed into the scheduler's
    /// `total_records_synced` counter.
    pub fn records_synced(&self) -> u64 {
        self.upload.as_ref().map(|u| u.records_uploaded).unwrap_or(0)
    }

    pub fn error_summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(u) = &self.upload {
            if let Some(e) = &u.error {
                parts.push(format!("upload: {e}"));
            }
        }
        if let Some(m) = &self.meters {
            if let Some(e) = &m.error {
                parts.push(format!("meters: {e}"));
            }
        }
        if let Some(t) = &self.tenant {
            if let Some(e) = &t.error {
                parts.push(format!("tenant: {e}"));
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

/// Read-only status snapshot. A failed counter read yields
/// zero in that field plus a logged warning, never an error out of
/// `status()`.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub is_running: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_success: Option<bool>,
    pub last_sync_error: Option<String>,
    pub queue_size: i64,
    pub total_records_synced: u64,
    pub local_meter_count: i64,
    pub remote_meter_count: i64,
    pub local_tenant_count: i64,
    pub remote_tenant_count: i64,
    pub local_db_connected: bool,
    pub remote_db_connected: bool,
}

/// Identifiers accepted/rejected by the validator ahead of an upload batch.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<Uuid>,
}
