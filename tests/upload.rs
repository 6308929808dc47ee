//! Integration tests for the upload pipeline. Requires a
//! live Postgres instance with the `metersync_local`/`metersync_remote`
//! databases migrated — see `migrations/`.

mod support;

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use metersync::models::Reading;
use metersync::sync::upload::UploadSyncManager;

fn sample_reading(tenant_id: i64, meter_id: i64) -> Reading {
    Reading {
        meter_reading_id: Uuid::new_v4(),
        created_at: Utc::now(),
        tenant_id,
        meter_id,
        meter_element_id: None,
        voltage_a: Some(230.0),
        voltage_b: Some(231.0),
        voltage_c: Some(229.5),
        current_a: Some(5.2),
        current_b: Some(5.1),
        current_c: Some(5.0),
        power_active: Some(1100.0),
        power_reactive: Some(80.0),
        power_apparent: Some(1103.0),
        energy_active: Some(44.0),
        energy_reactive: Some(2.0),
        frequency: Some(50.0),
        power_factor: Some(0.99),
        thd_voltage: Some(1.2),
        thd_current: Some(2.3),
        sync_status: "pending".into(),
        is_synchronized: false,
        retry_count: 0,
    }
}

async fn insert_local_reading(pool: &sqlx::PgPool, reading: &Reading) {
    sqlx::query(
        r#"
        INSERT INTO meter_reading
            (meter_reading_id, created_at, tenant_id, meter_id, meter_element_id,
             voltage_a, voltage_b, voltage_c, current_a, current_b, current_c,
             power_active, power_reactive, power_apparent, energy_active, energy_reactive,
             frequency, power_factor, thd_voltage, thd_current, sync_status, is_synchronized, retry_count)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
        "#,
    )
    .bind(reading.meter_reading_id)
    .bind(reading.created_at)
    .bind(reading.tenant_id)
    .bind(reading.meter_id)
    .bind(reading.meter_element_id)
    .bind(reading.voltage_a)
    .bind(reading.voltage_b)
    .bind(reading.voltage_c)
    .bind(reading.current_a)
    .bind(reading.current_b)
    .bind(reading.current_c)
    .bind(reading.power_active)
    .bind(reading.power_reactive)
    .bind(reading.power_apparent)
    .bind(reading.energy_active)
    .bind(reading.energy_reactive)
    .bind(reading.frequency)
    .bind(reading.power_factor)
    .bind(reading.thd_voltage)
    .bind(reading.thd_current)
    .bind(&reading.sync_status)
    .bind(reading.is_synchronized)
    .bind(reading.retry_count)
    .execute(pool)
    .await
    .expect("insert LOCAL reading");
}

#[tokio::test]
async fn uploads_batch_then_deletes_locally() {
    let connections = support::connections().await;
    let local = connections.local().unwrap().clone();
    let remote = connections.remote().unwrap().clone();

    let tenant_id = support::fresh_tenant_id();
    support::seed_tenant(&local, &remote, tenant_id, "acme").await;

    let readings: Vec<Reading> = (0..3).map(|i| sample_reading(tenant_id, 1000 + i)).collect();
    for r in &readings {
        insert_local_reading(&local, r).await;
    }

    let manager = UploadSyncManager::new(&connections, false);
    let result = manager.sync_readings(tenant_id, 100).await;

    assert!(result.success);
    assert_eq!(result.records_uploaded, 3);
    assert_eq!(result.records_deleted, 3);

    let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM meter_reading WHERE tenant_id = $1")
        .bind(tenant_id)
        .fetch_one(&local)
        .await
        .unwrap()
        .get("n");
    assert_eq!(remaining, 0);

    let on_remote: i64 = sqlx::query("SELECT COUNT(*) AS n FROM meter_reading WHERE tenant_id = $1")
        .bind(tenant_id)
        .fetch_one(&remote)
        .await
        .unwrap()
        .get("n");
    assert_eq!(on_remote, 3);

    support::cleanup_tenant(&local, &remote, tenant_id).await;
}

#[tokio::test]
async fn re_running_upload_on_same_ids_is_idempotent_on_remote() {
    let connections = support::connections().await;
    let local = connections.local().unwrap().clone();
    let remote = connections.remote().unwrap().clone();

    let tenant_id = support::fresh_tenant_id();
    support::seed_tenant(&local, &remote, tenant_id, "acme-2").await;

    let reading = sample_reading(tenant_id, 2000);
    insert_local_reading(&local, &reading).await;

    // Insert the same row directly on REMOTE first, simulating a prior
    // upload whose local flip/delete step never ran.
    sqlx::query(
        r#"
        INSERT INTO meter_reading
            (meter_reading_id, created_at, tenant_id, meter_id, meter_element_id,
             voltage_a, voltage_b, voltage_c, current_a, current_b, current_c,
             power_active, power_reactive, power_apparent, energy_active, energy_reactive,
             frequency, power_factor, thd_voltage, thd_current)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        "#,
    )
    .bind(reading.meter_reading_id)
    .bind(reading.created_at)
    .bind(reading.tenant_id)
    .bind(reading.meter_id)
    .bind(reading.meter_element_id)
    .bind(reading.voltage_a)
    .bind(reading.voltage_b)
    .bind(reading.voltage_c)
    .bind(reading.current_a)
    .bind(reading.current_b)
    .bind(reading.current_c)
    .bind(reading.power_active)
    .bind(reading.power_reactive)
    .bind(reading.power_apparent)
    .bind(reading.energy_active)
    .bind(reading.energy_reactive)
    .bind(reading.frequency)
    .bind(reading.power_factor)
    .bind(reading.thd_voltage)
    .bind(reading.thd_current)
    .execute(&remote)
    .await
    .expect("pre-seed REMOTE row");

    let manager = UploadSyncManager::new(&connections, false);
    let result = manager.sync_readings(tenant_id, 100).await;

    assert!(result.success);
    assert_eq!(result.records_deleted, 1);

    let on_remote: i64 = sqlx::query("SELECT COUNT(*) AS n FROM meter_reading WHERE tenant_id = $1")
        .bind(tenant_id)
        .fetch_one(&remote)
        .await
        .unwrap()
        .get("n");
    assert_eq!(on_remote, 1, "ON CONFLICT DO NOTHING must not duplicate the row");

    support::cleanup_tenant(&local, &remote, tenant_id).await;
}

#[tokio::test]
async fn empty_backlog_is_a_success_noop() {
    let connections = support::connections().await;
    let local = connections.local().unwrap().clone();
    let remote = connections.remote().unwrap().clone();

    let tenant_id = support::fresh_tenant_id();
    support::seed_tenant(&local, &remote, tenant_id, "acme-3").await;

    let manager = UploadSyncManager::new(&connections, false);
    let result = manager.sync_readings(tenant_id, 100).await;

    assert!(result.success);
    assert_eq!(result.records_uploaded, 0);
    assert_eq!(result.records_deleted, 0);

    support::cleanup_tenant(&local, &remote, tenant_id).await;
}
