//! Sync Scheduler: runs cycles on a fixed interval under
//! mutual exclusion, aggregates sub-results, maintains counters, handles
//! graceful shutdown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, info_span, warn, Instrument};

use crate::connection::ConnectionManager;
use crate::retry::sink_unhandled;
use crate::status::{self, StatusSnapshot};
use crate::storage::reading;
use crate::sync::download::DownloadSyncManager;
use crate::sync::types::{SyncCycleResult, SyncStatus, UploadResult};
use crate::sync::upload::UploadSyncManager;
use crate::tenant_config::TenantConfigLoader;
use crate::error::SyncError;

/// Shutdown fence: `stop()` polls the in-progress flag for at most this
/// long before giving up and returning anyway.
const STOP_FENCE: Duration = Duration::from_secs(5 * 60);
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct SchedulerConfig {
    pub interval_seconds: u64,
    pub validator_enabled: bool,
    pub refresh_tenant_config_each_cycle: bool,
    pub tenant_api_key_seed: Option<String>,
}

struct Counters {
    last_sync_time: Mutex<Option<DateTime<Utc>>>,
    last_sync_success: Mutex<Option<bool>>,
    last_sync_error: Mutex<Option<String>>,
    total_records_synced: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            last_sync_time: Mutex::new(None),
            last_sync_success: Mutex::new(None),
            last_sync_error: Mutex::new(None),
            total_records_synced: AtomicU64::new(0),
        }
    }
}

pub struct SyncScheduler {
    connections: Arc<ConnectionManager>,
    config: SchedulerConfig,
    /// Mutual-exclusion flag: set while a cycle is running.
    in_progress: Arc<AtomicBool>,
    /// Whether the timer task is currently alive.
    timer_active: Arc<AtomicBool>,
    shutdown_requested: Arc<AtomicBool>,
    counters: Arc<Counters>,
    cached_batch_size: Mutex<Option<i64>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(connections: Arc<ConnectionManager>, config: SchedulerConfig) -> Self {
        Self {
            connections,
            config,
            in_progress: Arc::new(AtomicBool::new(false)),
            timer_active: Arc::new(AtomicBool::new(false)),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            cached_batch_size: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Starts the timer. Runs one cycle immediately, then one every
    /// `interval_seconds`.
    pub fn start(self: &Arc<Self>) {
        if self.timer_active.swap(true, Ordering::AcqRel) {
            warn!("start() called while scheduler already running");
            return;
        }
        self.shutdown_requested.store(false, Ordering::Release);

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(this.config.interval_seconds));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if this.shutdown_requested.load(Ordering::Acquire) {
                    break;
                }
                this.tick().await;
                if this.shutdown_requested.load(Ordering::Acquire) {
                    break;
                }
            }
            this.timer_active.store(false, Ordering::Release);
        });
        *self.task.lock() = Some(handle);
    }

    async fn tick(self: &Arc<Self>) {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            warn!("sync cycle skipped: previous cycle still running");
            return;
        }
        let result = self.execute_sync_cycle().await;
        self.record(result);
        self.in_progress.store(false, Ordering::Release);
    }

    /// Runs one cycle directly, bypassing the timer — used by `start()`'s
    /// immediate first cycle and by tests driving a single pass.
    pub async fn run_once(self: &Arc<Self>) -> SyncCycleResult {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            warn!("run_once skipped: a cycle is already running");
            return SyncCycleResult {
                success: false,
                upload: None,
                meters: None,
                tenant: None,
                duration: Duration::ZERO,
            };
        }
        let result = self.execute_sync_cycle().await;
        self.record(result.clone());
        self.in_progress.store(false, Ordering::Release);
        result
    }

    fn record(&self, result: SyncCycleResult) {
        *self.counters.last_sync_time.lock() = Some(Utc::now());
        *self.counters.last_sync_success.lock() = Some(result.success);
        *self.counters.last_sync_error.lock() = result.error_summary();
        self.counters
            .total_records_synced
            .fetch_add(result.records_synced(), Ordering::Relaxed);
    }

    /// Composes upload → meter download → tenant download in strict
    /// sequence. Never panics out of
    /// this boundary: every fallible step returns a `Result` that is
    /// folded into the aggregate, and any unexpected error is routed to
    /// the unhandled-exception sink.
    pub async fn execute_sync_cycle(self: &Arc<Self>) -> SyncCycleResult {
        let start = Instant::now();
        let span = info_span!("cycle");
        async move {
            let tenant_id = TenantConfigLoader::new(&self.connections).local_tenant_id().await;

            let cached = *self.cached_batch_size.lock();
            let batch_size = match tenant_id {
                Some(id) if self.config.refresh_tenant_config_each_cycle || cached.is_none() => {
                    let cfg = TenantConfigLoader::new(&self.connections).batch_config(id).await;
                    *self.cached_batch_size.lock() = Some(cfg.upload_batch_size);
                    cfg.upload_batch_size
                }
                _ => cached.unwrap_or(100),
            };

            let upload_result = match tenant_id {
                Some(id) => {
                    let manager = UploadSyncManager::new(&self.connections, self.config.validator_enabled);
                    Some(manager.sync_readings(id, batch_size).await)
                }
                None => self.upload_without_tenant_row(batch_size).await,
            };

            let meters_result = match tenant_id {
                Some(id) => {
                    let manager = DownloadSyncManager::new(&self.connections, self.config.tenant_api_key_seed.as_deref());
                    Some(manager.sync_meter_configurations(id).await)
                }
                None => {
                    warn!("no LOCAL tenant row; skipping meter download this cycle");
                    None
                }
            };

            let tenant_manager = DownloadSyncManager::new(&self.connections, self.config.tenant_api_key_seed.as_deref());
            let tenant_result = tenant_manager.sync_tenant_data().await;

            let success = upload_result.as_ref().map(|u| u.success).unwrap_or(true)
                && meters_result.as_ref().map(|m| m.success).unwrap_or(true)
                && tenant_result.success;

            if !success {
                sink_unhandled(
                    "cycle",
                    &SyncError::Unknown("one or more sync phases failed".into()),
                );
            }

            info!(success, "sync cycle complete");

            SyncCycleResult {
                success,
                upload: upload_result,
                meters: meters_result,
                tenant: Some(tenant_result),
                duration: start.elapsed(),
            }
        }
        .instrument(span)
        .await
    }

    /// Uploads on a LOCAL that has no `tenant` row yet. Scope is derived
    /// straight from the backlog's own `tenant_id` column rather than the
    /// (absent) tenant config, so readings still drain before the tenant is
    /// first discovered by a download cycle.
    async fn upload_without_tenant_row(self: &Arc<Self>, batch_size: i64) -> Option<UploadResult> {
        let local = self.connections.local().ok()?;
        let tenant_ids = match reading::distinct_backlog_tenant_ids(local).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to discover backlog tenant ids; skipping upload this cycle");
                return None;
            }
        };
        if tenant_ids.is_empty() {
            return None;
        }

        let start = Instant::now();
        let manager = UploadSyncManager::new(&self.connections, self.config.validator_enabled);
        let mut combined = UploadResult {
            success: true,
            ..Default::default()
        };
        let mut errors = Vec::new();
        for id in tenant_ids {
            let result = manager.sync_readings(id, batch_size).await;
            combined.records_uploaded += result.records_uploaded;
            combined.records_deleted += result.records_deleted;
            if !result.success {
                combined.success = false;
                if let Some(e) = result.error {
                    errors.push(format!("tenant {id}: {e}"));
                }
            }
        }
        combined.error = (!errors.is_empty()).then(|| errors.join("; "));
        combined.duration = start.elapsed();
        Some(combined)
    }

    /// Cancels the timer, then waits for any in-progress cycle to finish
    /// its current transaction, up to a 5-minute fence.
    pub async fn stop(self: &Arc<Self>) {
        self.shutdown_requested.store(true, Ordering::Release);

        let fence_start = Instant::now();
        while self.in_progress.load(Ordering::Acquire) && fence_start.elapsed() < STOP_FENCE {
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
        if self.in_progress.load(Ordering::Acquire) {
            warn!("stop() fence elapsed with a cycle still in progress");
        }

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        info!("scheduler stopped");
    }

    pub async fn status(&self) -> SyncStatus {
        let snapshot = StatusSnapshot {
            is_running: self.timer_active.load(Ordering::Acquire),
            last_sync_time: *self.counters.last_sync_time.lock(),
            last_sync_success: *self.counters.last_sync_success.lock(),
            last_sync_error: self.counters.last_sync_error.lock().clone(),
            total_records_synced: self.counters.total_records_synced.load(Ordering::Relaxed),
        };
        status::status(&self.connections, snapshot).await
    }
}
