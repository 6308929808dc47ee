//! LOCAL/REMOTE access for the `meter` table. Owned exclusively by the
//! download manager.

use sqlx::PgPool;

use crate::error::Result;
use crate::models::Meter;

const SELECT_COLUMNS: &str =
    "meter_id, tenant_id, name, device_id, ip, port, active, element, meter_element_id";

/// Fetch all meter rows (joined with element) for
/// `tenant_id` from REMOTE.
pub async fn fetch_remote(pool: &PgPool, tenant_id: i64) -> Result<Vec<Meter>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM meter WHERE tenant_id = $1");
    let rows = sqlx::query_as::<_, Meter>(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetch all meter rows for `tenant_id` from LOCAL.
pub async fn fetch_local(pool: &PgPool, tenant_id: i64) -> Result<Vec<Meter>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM meter WHERE tenant_id = $1");
    let rows = sqlx::query_as::<_, Meter>(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Inserts a meter row not yet present on LOCAL.
pub async fn insert_local(pool: &PgPool, meter: &Meter) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meter (meter_id, tenant_id, name, device_id, ip, port, active, element, meter_element_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(meter.meter_id)
    .bind(meter.tenant_id)
    .bind(&meter.name)
    .bind(meter.device_id)
    .bind(&meter.ip)
    .bind(&meter.port)
    .bind(meter.active)
    .bind(&meter.element)
    .bind(meter.meter_element_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Updates the replicated fields of an existing LOCAL meter row.
pub async fn update_local(pool: &PgPool, meter: &Meter) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE meter
        SET name = $2, device_id = $3, ip = $4, port = $5, active = $6, element = $7, meter_element_id = $8
        WHERE meter_id = $1
        "#,
    )
    .bind(meter.meter_id)
    .bind(&meter.name)
    .bind(meter.device_id)
    .bind(&meter.ip)
    .bind(&meter.port)
    .bind(meter.active)
    .bind(&meter.element)
    .bind(meter.meter_element_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Count of LOCAL meter rows for status reporting.
pub async fn count_local(pool: &PgPool) -> Result<i64> {
    count(pool, "meter").await
}

/// Count of REMOTE meter rows for status reporting.
pub async fn count_remote(pool: &PgPool) -> Result<i64> {
    count(pool, "meter").await
}

async fn count(pool: &PgPool, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let (n,): (i64,) = sqlx::query_as(&sql).fetch_one(pool).await?;
    Ok(n)
}
