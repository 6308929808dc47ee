//! Integration tests for cycle composition and mutual exclusion.

mod support;

use std::sync::Arc;

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use metersync::models::Reading;
use metersync::{SchedulerConfig, SyncScheduler};

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

fn scheduler(connections: Arc<metersync::ConnectionManager>) -> Arc<SyncScheduler> {
    Arc::new(SyncScheduler::new(
        connections,
        SchedulerConfig {
            interval_seconds: 3600,
            validator_enabled: false,
            refresh_tenant_config_each_cycle: false,
            tenant_api_key_seed: None,
        },
    ))
}

#[tokio::test]
async fn run_once_composes_upload_and_download_phases() {
    let connections = support::connections().await;
    let local = connections.local().unwrap().clone();
    let remote = connections.remote().unwrap().clone();

    let tenant_id = support::fresh_tenant_id();
    support::seed_tenant(&local, &remote, tenant_id, "cycle-co").await;

    let scheduler = scheduler(Arc::new(connections));
    let result = scheduler.run_once().await;

    assert!(result.success);
    assert!(result.upload.is_some());
    assert!(result.meters.is_some());
    assert!(result.tenant.is_some());

    support::cleanup_tenant(&local, &remote, tenant_id).await;
}

#[tokio::test]
async fn concurrent_run_once_calls_are_mutually_exclusive() {
    let connections = Arc::new(support::connections().await);
    let local = connections.local().unwrap().clone();
    let remote = connections.remote().unwrap().clone();

    let tenant_id = support::fresh_tenant_id();
    support::seed_tenant(&local, &remote, tenant_id, "mutex-co").await;

    let scheduler_a = scheduler(Arc::clone(&connections));
    let scheduler_b = Arc::clone(&scheduler_a);

    let (first, second) = tokio::join!(scheduler_a.run_once(), scheduler_b.run_once());

    // One of the two concurrent calls must observe the in-progress flag
    // already held and bail out without running any phase.
    let skipped = [&first, &second]
        .iter()
        .filter(|r| r.upload.is_none() && r.meters.is_none() && r.tenant.is_none())
        .count();
    assert_eq!(skipped, 1, "exactly one concurrent run_once call must be skipped");

    support::cleanup_tenant(&local, &remote, tenant_id).await;
}

#[tokio::test]
async fn upload_drains_backlog_even_without_a_local_tenant_row() {
    let connections = support::connections().await;
    let local = connections.local().unwrap().clone();
    let remote = connections.remote().unwrap().clone();

    // No `tenant` row on either side — only a backlog reading, as on a
    // fresh LOCAL that hasn't run a download cycle yet.
    let tenant_id = support::fresh_tenant_id();
    let reading = sample_reading(tenant_id, 3000);
    insert_local_reading(&local, &reading).await;

    let scheduler = scheduler(Arc::new(connections));
    let result = scheduler.run_once().await;

    assert!(result.success);
    let upload = result.upload.expect("upload phase must still run without a tenant row");
    assert_eq!(upload.records_uploaded, 1);
    assert_eq!(upload.records_deleted, 1);
    assert!(result.meters.is_none(), "meter download has no tenant id to scope to");

    let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM meter_reading WHERE tenant_id = $1")
        .bind(tenant_id)
        .fetch_one(&local)
        .await
        .unwrap()
        .get("n");
    assert_eq!(remaining, 0);

    sqlx::query("DELETE FROM meter_reading WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(&remote)
        .await
        .unwrap();
}

#[tokio::test]
async fn status_reports_backlog_and_connectivity() {
    let connections = Arc::new(support::connections().await);
    let local = connections.local().unwrap().clone();
    let remote = connections.remote().unwrap().clone();

    let tenant_id = support::fresh_tenant_id();
    support::seed_tenant(&local, &remote, tenant_id, "status-co").await;

    let scheduler = scheduler(Arc::clone(&connections));
    scheduler.run_once().await;
    let status = scheduler.status().await;

    assert!(status.local_db_connected);
    assert!(status.remote_db_connected);
    assert!(status.last_sync_time.is_some());
    assert_eq!(status.last_sync_success, Some(true));

    support::cleanup_tenant(&local, &remote, tenant_id).await;
}
