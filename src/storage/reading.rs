//! LOCAL/REMOTE access for the `meter_reading` table. Owned exclusively by
//! the upload manager.

use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Reading, REMOTE_INSERT_COLUMNS};

/// Fetch up to `limit` unsynchronized rows for `tenant_id`, oldest first.
pub async fn fetch_unsynced(
    pool: &PgPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<Reading>> {
    let rows = sqlx::query_as::<_, Reading>(
        r#"
        SELECT meter_reading_id, created_at, tenant_id, meter_id, meter_element_id,
               voltage_a, voltage_b, voltage_c, current_a, current_b, current_c,
               power_active, power_reactive, power_apparent, energy_active, energy_reactive,
               frequency, power_factor, thd_voltage, thd_current,
               sync_status, is_synchronized, retry_count
        FROM meter_reading
        WHERE tenant_id = $1 AND is_synchronized = false AND sync_status != 'failed_validation'
        ORDER BY created_at ASC
        LIMIT $2
        "#,
    )
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Multi-row, conflict-ignoring insert into REMOTE within the caller's
/// transaction.
pub async fn insert_remote_batch(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    readings: &[Reading],
) -> Result<u64> {
    if readings.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO meter_reading (");
    for (i, col) in REMOTE_INSERT_COLUMNS.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(col);
    }
    builder.push(") ");

    builder.push_values(readings, |mut row, reading| {
        row.push_bind(reading.meter_reading_id)
            .push_bind(reading.created_at)
            .push_bind(reading.tenant_id)
            .push_bind(reading.meter_id)
            .push_bind(reading.meter_element_id)
            .push_bind(reading.voltage_a)
            .push_bind(reading.voltage_b)
            .push_bind(reading.voltage_c)
            .push_bind(reading.current_a)
            .push_bind(reading.current_b)
            .push_bind(reading.current_c)
            .push_bind(reading.power_active)
            .push_bind(reading.power_reactive)
            .push_bind(reading.power_apparent)
            .push_bind(reading.energy_active)
            .push_bind(reading.energy_reactive)
            .push_bind(reading.frequency)
            .push_bind(reading.power_factor)
            .push_bind(reading.thd_voltage)
            .push_bind(reading.thd_current);
    });

    builder.push(" ON CONFLICT (meter_reading_id) DO NOTHING");

    let result = builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

/// Flips `is_synchronized = true` on LOCAL for the given ids, within the
/// caller's transaction (preferred self-healing path).
pub async fn mark_synchronized(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    ids: &[Uuid],
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE meter_reading SET is_synchronized = true, sync_status = 'synchronized' WHERE meter_reading_id = ANY($1::uuid[])",
    )
    .bind(ids)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Deletes the given ids from LOCAL within the caller's transaction.
pub async fn delete_local(tx: &mut sqlx::Transaction<'_, Postgres>, ids: &[Uuid]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM meter_reading WHERE meter_reading_id = ANY($1::uuid[])")
        .bind(ids)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// Best-effort retry-count bump on REMOTE failure.
pub async fn increment_retry_count(pool: &PgPool, ids: &[Uuid]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "UPDATE meter_reading SET retry_count = retry_count + 1 WHERE meter_reading_id = ANY($1::uuid[])",
    )
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(())
}

/// Distinct tenant ids with at least one unsynchronized row on LOCAL. Used
/// to scope uploads when LOCAL has no `tenant` row yet to read the id from.
pub async fn distinct_backlog_tenant_ids(pool: &PgPool) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT DISTINCT tenant_id FROM meter_reading WHERE is_synchronized = false ORDER BY tenant_id",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(|row| row.try_get::<i64, _>("tenant_id").map_err(Into::into)).collect()
}

/// Count of LOCAL rows with `is_synchronized = false` — the backlog.
pub async fn count_backlog(pool: &PgPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM meter_reading WHERE is_synchronized = false")
        .fetch_one(pool)
        .await?;
    Ok(row.try_get::<i64, _>("n")?)
}

/// Marks rows as rejected by the validator: excluded from
/// future batches until a caller explicitly reconciles them.
pub async fn mark_failed_validation(pool: &PgPool, ids: &[Uuid]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE meter_reading SET sync_status = 'failed_validation' WHERE meter_reading_id = ANY($1::uuid[])",
    )
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
