//! Row types shared by the storage layer and sync managers. Columns are
//! enumerated explicitly rather than discovered by reflection — adding a
//! measurement column to `meter_reading` is a deliberate edit here plus a
//! migration, never a runtime surprise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A meter reading row. LOCAL-owned, transient: created externally with
/// `is_synchronized = false`, consumed (remote insert + local delete) by the
/// upload manager.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Reading {
    pub meter_reading_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tenant_id: i64,
    pub meter_id: i64,
    pub meter_element_id: Option<i64>,
    pub voltage_a: Option<f64>,
    pub voltage_b: Option<f64>,
    pub voltage_c: Option<f64>,
    pub current_a: Option<f64>,
    pub current_b: Option<f64>,
    pub current_c: Option<f64>,
    pub power_active: Option<f64>,
    pub power_reactive: Option<f64>,
    pub power_apparent: Option<f64>,
    pub energy_active: Option<f64>,
    pub energy_reactive: Option<f64>,
    pub frequency: Option<f64>,
    pub power_factor: Option<f64>,
    pub thd_voltage: Option<f64>,
    pub thd_current: Option<f64>,
    pub sync_status: String,
    pub is_synchronized: bool,
    pub retry_count: i64,
}

/// Columns inserted into REMOTE, in order. LOCAL-only sync-status fields
/// (`sync_status`, `is_synchronized`, `retry_count`) are deliberately
/// excluded.
pub const REMOTE_INSERT_COLUMNS: &[&str] = &[
    "meter_reading_id",
    "created_at",
    "tenant_id",
    "meter_id",
    "meter_element_id",
    "voltage_a",
    "voltage_b",
    "voltage_c",
    "current_a",
    "current_b",
    "current_c",
    "power_active",
    "power_reactive",
    "power_apparent",
    "energy_active",
    "energy_reactive",
    "frequency",
    "power_factor",
    "thd_voltage",
    "thd_current",
];

/// A meter row. Authoritative on REMOTE, replicated read-only to LOCAL.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
pub struct Meter {
    pub meter_id: i64,
    pub tenant_id: i64,
    pub name: Option<String>,
    pub device_id: Option<i64>,
    pub ip: Option<String>,
    pub port: Option<String>,
    pub active: bool,
    pub element: Option<String>,
    pub meter_element_id: Option<i64>,
}

impl Meter {
    /// Replicated fields compared during reconciliation.
    pub fn replicated_fields_differ(&self, other: &Meter) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.device_id != other.device_id {
            changed.push("device_id");
        }
        if self.ip != other.ip {
            changed.push("ip");
        }
        if self.port != other.port {
            changed.push("port");
        }
        if self.active != other.active {
            changed.push("active");
        }
        if self.element != other.element {
            changed.push("element");
        }
        changed
    }
}

/// A tenant row. Authoritative fields live on REMOTE; `download_batch_size`,
/// `upload_batch_size`, `api_key` are LOCAL-only metadata never overwritten
/// by a download cycle.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub tenant_id: i64,
    pub name: String,
    pub url: Option<String>,
    pub street: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub active: bool,
    pub download_batch_size: i32,
    pub upload_batch_size: i32,
    pub api_key: Option<String>,
}

impl Tenant {
    /// Replicated fields compared during reconciliation.
    /// LOCAL-only columns are intentionally excluded from this comparison.
    pub fn replicated_fields_differ(&self, other: &Tenant) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.name != other.name {
            changed.push("name");
        }
        if self.url != other.url {
            changed.push("url");
        }
        if self.street != other.street {
            changed.push("street");
        }
        if self.street2 != other.street2 {
            changed.push("street2");
        }
        if self.city != other.city {
            changed.push("city");
        }
        if self.state != other.state {
            changed.push("state");
        }
        if self.zip != other.zip {
            changed.push("zip");
        }
        if self.country != other.country {
            changed.push("country");
        }
        if self.active != other.active {
            changed.push("active");
        }
        changed
    }
}

/// Per-tenant batch size knobs, with fallback defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantBatchConfig {
    pub download_batch_size: i64,
    pub upload_batch_size: i64,
}

impl Default for TenantBatchConfig {
    fn default() -> Self {
        Self {
            download_batch_size: 1000,
            upload_batch_size: 100,
        }
    }
}

/// Append-only diagnostic record, write-only from every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub operation_type: String,
    pub batch_size: i64,
    pub success: bool,
    pub error_message: Option<String>,
}
