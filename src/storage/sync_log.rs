//! `sync_log` access — write-only from every component.

use sqlx::PgPool;

use crate::error::Result;
use crate::models::SyncLogEntry;

pub async fn record(pool: &PgPool, entry: &SyncLogEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO sync_log (operation_type, batch_size, success, error_message) VALUES ($1, $2, $3, $4)",
    )
    .bind(&entry.operation_type)
    .bind(entry.batch_size as i32)
    .bind(entry.success)
    .bind(&entry.error_message)
    .execute(pool)
    .await?;
    Ok(())
}
