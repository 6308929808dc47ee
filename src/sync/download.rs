//! Download Sync Manager: two independent reconciliation
//! passes, each idempotent against REMOTE-as-authority.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{instrument, warn};

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::retry::{execute_with_retry, run_download, RetryPolicy};
use crate::storage::{meter, tenant};
use crate::sync::types::{MeterSyncResult, TenantChange, TenantSyncResult};

pub struct DownloadSyncManager<'a> {
    connections: &'a ConnectionManager,
    tenant_api_key_seed: Option<&'a str>,
}

impl<'a> DownloadSyncManager<'a> {
    pub fn new(connections: &'a ConnectionManager, tenant_api_key_seed: Option<&'a str>) -> Self {
        Self {
            connections,
            tenant_api_key_seed,
        }
    }

    /// Reconciles `meter` rows for `tenant_id`. Deletions never propagate: rows present on LOCAL
    /// but absent from REMOTE are left untouched this cycle.
    #[instrument(skip(self), fields(tenant_id))]
    pub async fn sync_meter_configurations(&self, tenant_id: i64) -> MeterSyncResult {
        let start = Instant::now();
        match run_download(self.run_meters(tenant_id), "download.meters").await {
            Ok(mut result) => {
                result.duration = start.elapsed();
                result.success = true;
                result
            }
            Err(err) => {
                warn!(tenant_id, error = %err, "meter reconciliation failed");
                MeterSyncResult {
                    success: false,
                    error: Some(err.to_string()),
                    duration: start.elapsed(),
                    ..Default::default()
                }
            }
        }
    }

    async fn run_meters(&self, tenant_id: i64) -> Result<MeterSyncResult> {
        let local_pool = self.connections.local()?;
        let remote_pool = self.connections.remote()?;

        let remote_rows = execute_with_retry(
            || meter::fetch_remote(remote_pool, tenant_id),
            RetryPolicy::QUERY,
            "download.meters.fetch_remote",
        )
        .await?;
        let local_rows = execute_with_retry(
            || meter::fetch_local(local_pool, tenant_id),
            RetryPolicy::QUERY,
            "download.meters.fetch_local",
        )
        .await?;

        let mut by_id = HashMap::with_capacity(local_rows.len());
        for row in local_rows {
            by_id.insert(row.meter_id, row);
        }

        let mut new_meter_ids = Vec::new();
        let mut updated_meter_ids = Vec::new();

        for remote in &remote_rows {
            match by_id.get(&remote.meter_id) {
                None => {
                    meter::insert_local(local_pool, remote).await?;
                    new_meter_ids.push(remote.meter_id);
                }
                Some(existing) => {
                    let changed = existing.replicated_fields_differ(remote);
                    if !changed.is_empty() {
                        meter::update_local(local_pool, remote).await?;
                        updated_meter_ids.push(remote.meter_id);
                    }
                }
            }
        }

        Ok(MeterSyncResult {
            success: true,
            new_meters: new_meter_ids.len(),
            updated_meters: updated_meter_ids.len(),
            total_meters: remote_rows.len(),
            new_meter_ids,
            updated_meter_ids,
            error: None,
            duration: Default::default(),
        })
    }

    /// Reconciles `tenant` rows. LOCAL-only columns are never part of the
    /// diff or the update.
    #[instrument(skip(self))]
    pub async fn sync_tenant_data(&self) -> TenantSyncResult {
        let start = Instant::now();
        match run_download(self.run_tenants(), "download.tenants").await {
            Ok(mut result) => {
                result.duration = start.elapsed();
                result.success = true;
                result
            }
            Err(err) => {
                warn!(error = %err, "tenant reconciliation failed");
                TenantSyncResult {
                    success: false,
                    error: Some(err.to_string()),
                    duration: start.elapsed(),
                    ..Default::default()
                }
            }
        }
    }

    async fn run_tenants(&self) -> Result<TenantSyncResult> {
        let local_pool = self.connections.local()?;
        let remote_pool = self.connections.remote()?;

        let remote_rows = execute_with_retry(
            || tenant::fetch_remote(remote_pool),
            RetryPolicy::QUERY,
            "download.tenants.fetch_remote",
        )
        .await?;
        let local_rows = execute_with_retry(
            || tenant::fetch_local(local_pool),
            RetryPolicy::QUERY,
            "download.tenants.fetch_local",
        )
        .await?;

        let mut by_id = HashMap::with_capacity(local_rows.len());
        for row in local_rows {
            by_id.insert(row.tenant_id, row);
        }

        let mut new_tenant_ids = Vec::new();
        let mut updated_tenant_ids = Vec::new();
        let mut tenant_changes = Vec::new();

        for remote in &remote_rows {
            match by_id.get(&remote.tenant_id) {
                None => {
                    tenant::insert_local(local_pool, remote, self.tenant_api_key_seed).await?;
                    new_tenant_ids.push(remote.tenant_id);
                }
                Some(existing) => {
                    let changed = existing.replicated_fields_differ(remote);
                    if !changed.is_empty() {
                        tenant::update_local_replicated(local_pool, remote).await?;
                        updated_tenant_ids.push(remote.tenant_id);
                        tenant_changes.push(TenantChange {
                            tenant_id: remote.tenant_id,
                            changed_fields: changed,
                        });
                    }
                }
            }
        }

        Ok(TenantSyncResult {
            success: true,
            new_tenants: new_tenant_ids.len(),
            updated_tenants: updated_tenant_ids.len(),
            total_tenants: remote_rows.len(),
            new_tenant_ids,
            updated_tenant_ids,
            tenant_changes,
            error: None,
            duration: Default::default(),
        })
    }
}
