//! LOCAL/REMOTE access for the `tenant` table. Owned exclusively by the
//! download manager. LOCAL-only configuration
//! columns (`download_batch_size`, `upload_batch_size`, `api_key`) are never
//! written by anything reading from REMOTE.

use sqlx::PgPool;

use crate::error::Result;
use crate::models::{Tenant, TenantBatchConfig};

const REPLICATED_COLUMNS: &str =
    "tenant_id, name, url, street, street2, city, state, zip, country, active";

/// Fetch all tenant rows from REMOTE. REMOTE has no concept of the
/// LOCAL-only batch-size/api-key columns, so they are filled with
/// placeholder defaults — callers must only compare replicated fields,
/// which `Tenant::replicated_fields_differ` already enforces.
pub async fn fetch_remote(pool: &PgPool) -> Result<Vec<Tenant>> {
    let sql = format!(
        "SELECT {REPLICATED_COLUMNS}, 1000 AS download_batch_size, 100 AS upload_batch_size, NULL::text AS api_key FROM tenant"
    );
    let rows = sqlx::query_as::<_, Tenant>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Fetch all tenant rows from LOCAL, including the LOCAL-only config columns.
pub async fn fetch_local(pool: &PgPool) -> Result<Vec<Tenant>> {
    let rows = sqlx::query_as::<_, Tenant>(
        "SELECT tenant_id, name, url, street, street2, city, state, zip, country, active, \
         download_batch_size, upload_batch_size, api_key FROM tenant",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a tenant row not yet present on LOCAL, applying the configured
/// API-key seed  and the default batch sizes.
pub async fn insert_local(pool: &PgPool, tenant: &Tenant, api_key_seed: Option<&str>) -> Result<()> {
    let defaults = TenantBatchConfig::default();
    sqlx::query(
        r#"
        INSERT INTO tenant
            (tenant_id, name, url, street, street2, city, state, zip, country, active,
             download_batch_size, upload_batch_size, api_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(tenant.tenant_id)
    .bind(&tenant.name)
    .bind(&tenant.url)
    .bind(&tenant.street)
    .bind(&tenant.street2)
    .bind(&tenant.city)
    .bind(&tenant.state)
    .bind(&tenant.zip)
    .bind(&tenant.country)
    .bind(tenant.active)
    .bind(defaults.download_batch_size as i32)
    .bind(defaults.upload_batch_size as i32)
    .bind(api_key_seed)
    .execute(pool)
    .await?;
    Ok(())
}

/// Updates only the replicated fields of an existing LOCAL tenant row. The
/// LOCAL-only columns are omitted from the `SET` clause entirely so they
/// can never be clobbered by a download cycle.
pub async fn update_local_replicated(pool: &PgPool, tenant: &Tenant) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE tenant
        SET name = $2, url = $3, street = $4, street2 = $5, city = $6, state = $7,
            zip = $8, country = $9, active = $10, updated_at = now()
        WHERE tenant_id = $1
        "#,
    )
    .bind(tenant.tenant_id)
    .bind(&tenant.name)
    .bind(&tenant.url)
    .bind(&tenant.street)
    .bind(&tenant.street2)
    .bind(&tenant.city)
    .bind(&tenant.state)
    .bind(&tenant.zip)
    .bind(&tenant.country)
    .bind(tenant.active)
    .execute(pool)
    .await?;
    Ok(())
}

/// The single tenant this daemon serves , read from LOCAL. `None` if LOCAL has no tenant row yet.
pub async fn local_tenant_id(pool: &PgPool) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT tenant_id FROM tenant ORDER BY tenant_id LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(id,)| id))
}

/// Per-tenant batch size knobs, falling back to `{1000, 100}` when the
/// tenant row is missing or its config columns are unset.
pub async fn batch_config(pool: &PgPool, tenant_id: i64) -> Result<TenantBatchConfig> {
    let row: Option<(Option<i32>, Option<i32>)> = sqlx::query_as(
        "SELECT download_batch_size, upload_batch_size FROM tenant WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    let defaults = TenantBatchConfig::default();
    Ok(match row {
        Some((download, upload)) => TenantBatchConfig {
            download_batch_size: download.map(i64::from).unwrap_or(defaults.download_batch_size),
            upload_batch_size: upload.map(i64::from).unwrap_or(defaults.upload_batch_size),
        },
        None => defaults,
    })
}

/// Count of LOCAL tenant rows for status reporting.
pub async fn count_local(pool: &PgPool) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tenant").fetch_one(pool).await?;
    Ok(n)
}

/// Count of REMOTE tenant rows for status reporting.
pub async fn count_remote(pool: &PgPool) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tenant").fetch_one(pool).await?;
    Ok(n)
}
