//! Upload Sync Manager: fetches a batch of unsynchronized readings,
//! inserts them into REMOTE, then flips and deletes them on LOCAL.

use std::time::Instant;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::connection::ConnectionManager;
use crate::error::{Result, SyncError};
use crate::models::{Reading, SyncLogEntry};
use crate::retry::{execute_with_retry, run_delete, run_upload, RetryPolicy};
use crate::storage::{reading, sync_log};
use crate::sync::types::{UploadResult, ValidationOutcome};
use crate::validator;

pub struct UploadSyncManager<'a> {
    connections: &'a ConnectionManager,
    validator_enabled: bool,
}

impl<'a> UploadSyncManager<'a> {
    pub fn new(connections: &'a ConnectionManager, validator_enabled: bool) -> Self {
        Self {
            connections,
            validator_enabled,
        }
    }

    /// Runs one upload pass for `tenant_id`, bounded by `batch_size`. Only
    /// one batch is processed; the manager does not loop internally.
    #[instrument(skip(self), fields(tenant_id))]
    pub async fn sync_readings(&self, tenant_id: i64, batch_size: i64) -> UploadResult {
        let start = Instant::now();
        match self.run(tenant_id, batch_size).await {
            Ok((uploaded, deleted)) => UploadResult {
                success: true,
                records_uploaded: uploaded,
                records_deleted: deleted,
                error: None,
                duration: start.elapsed(),
            },
            Err(err) => {
                warn!(tenant_id, error = %err, "upload cycle failed");
                UploadResult {
                    success: false,
                    records_uploaded: 0,
                    records_deleted: 0,
                    error: Some(err.to_string()),
                    duration: start.elapsed(),
                }
            }
        }
    }

    async fn run(&self, tenant_id: i64, batch_size: i64) -> Result<(u64, u64)> {
        let local = self.connections.local()?;
        let remote = self.connections.remote()?;

        // Step 1: select the batch under the Query retry policy.
        let batch = execute_with_retry(
            || reading::fetch_unsynced(local, tenant_id, batch_size),
            RetryPolicy::QUERY,
            "upload.fetch_unsynced",
        )
        .await?;

        if batch.is_empty() {
            return Ok((0, 0));
        }

        let outcome = self.filter_validated(&batch);
        if !outcome.rejected.is_empty() {
            if let Err(e) = reading::mark_failed_validation(local, &outcome.rejected).await {
                warn!(error = %e, "failed to mark rejected rows");
            }
        }
        if outcome.accepted.is_empty() {
            return Ok((0, 0));
        }

        let accepted_readings: Vec<Reading> = batch
            .into_iter()
            .filter(|r| outcome.accepted.contains(&r.meter_reading_id))
            .collect();

        // Step 2: open a REMOTE transaction, insert, commit.
        let uploaded = match self.upload_to_remote(remote, &accepted_readings).await {
            Ok(n) => n,
            Err(err) => {
                // Step 3: REMOTE failure — rollback already happened inside
                // upload_to_remote; the batch stays pending on LOCAL.
                let ids: Vec<Uuid> = accepted_readings.iter().map(|r| r.meter_reading_id).collect();
                if let Err(e) = reading::increment_retry_count(local, &ids).await {
                    warn!(error = %e, "failed to bump retry_count after upload failure");
                }
                self.log(local, "upload", accepted_readings.len(), false, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        // Step 4/5: flip then delete on LOCAL, each its own transaction.
        let ids: Vec<Uuid> = accepted_readings.iter().map(|r| r.meter_reading_id).collect();
        let deleted = self.delete_from_local(local, &ids).await?;

        self.log(local, "upload", accepted_readings.len(), true, None).await;
        Ok((uploaded, deleted))
    }

    fn filter_validated(&self, batch: &[Reading]) -> ValidationOutcome {
        if !self.validator_enabled {
            return ValidationOutcome {
                accepted: batch.iter().map(|r| r.meter_reading_id).collect(),
                rejected: Vec::new(),
            };
        }
        let mut outcome = ValidationOutcome::default();
        for r in batch {
            let issues = validator::validate(r);
            if validator::is_rejected(&issues) {
                outcome.rejected.push(r.meter_reading_id);
            } else {
                outcome.accepted.push(r.meter_reading_id);
            }
        }
        outcome
    }

    async fn upload_to_remote(&self, remote: &sqlx::PgPool, batch: &[Reading]) -> Result<u64> {
        run_upload(
            async {
                let mut tx = remote
                    .begin()
                    .await
                    .map_err(|e| SyncError::Upload(e.to_string()))?;
                let uploaded = reading::insert_remote_batch(&mut tx, batch)
                    .await
                    .map_err(|e| SyncError::Upload(e.to_string()))?;
                tx.commit().await.map_err(|e| SyncError::Upload(e.to_string()))?;
                Ok(uploaded)
            },
            "upload.insert_remote_batch",
        )
        .await
    }

    async fn delete_from_local(&self, local: &sqlx::PgPool, ids: &[Uuid]) -> Result<u64> {
        // Flip synchronized flag first (preferred self-healing path).
        let mut flip_tx = local.begin().await.map_err(|e| SyncError::Delete(e.to_string()))?;
        reading::mark_synchronized(&mut flip_tx, ids)
            .await
            .map_err(|e| SyncError::Delete(e.to_string()))?;
        flip_tx
            .commit()
            .await
            .map_err(|e| SyncError::Delete(e.to_string()))?;

        run_delete(
            async {
                let mut tx = local.begin().await.map_err(|e| SyncError::Delete(e.to_string()))?;
                let deleted = reading::delete_local(&mut tx, ids)
                    .await
                    .map_err(|e| SyncError::Delete(e.to_string()))?;
                tx.commit().await.map_err(|e| SyncError::Delete(e.to_string()))?;
                Ok(deleted)
            },
            "upload.delete_local",
        )
        .await
        .or_else(|err| {
            // Delete rollback: rows stay `is_synchronized = true` on LOCAL
            // and are excluded from the next cycle's WHERE clause — the
            // invariant holds even though the physical delete didn't happen.
            warn!(error = %err, "local delete failed after remote commit; rows remain flagged synchronized");
            Ok(0)
        })
    }

    async fn log(&self, local: &sqlx::PgPool, op: &str, batch_size: usize, success: bool, error: Option<String>) {
        let entry = SyncLogEntry {
            operation_type: op.to_string(),
            batch_size: batch_size as i64,
            success,
            error_message: error,
        };
        if let Err(e) = sync_log::record(local, &entry).await {
            warn!(error = %e, "failed to write sync_log entry");
        } else {
            info!(op, batch_size, success, "sync_log recorded");
        }
    }
}
