use std::sync::Arc;

use metersync::{config::Config, connection::ConnectionManager, logging, sync::SchedulerConfig, SyncScheduler};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("configuration error: {e}");
        e
    })?;

    logging::init(&config.log_level, config.log_format);

    info!(interval_seconds = config.interval_seconds, "starting metersync");

    let connections = Arc::new(ConnectionManager::connect(&config).await?);

    let scheduler = Arc::new(SyncScheduler::new(
        Arc::clone(&connections),
        SchedulerConfig {
            interval_seconds: config.interval_seconds,
            validator_enabled: config.validator_enabled,
            refresh_tenant_config_each_cycle: config.refresh_tenant_config_each_cycle,
            tenant_api_key_seed: config.tenant_api_key_seed.clone(),
        },
    ));

    scheduler.start();

    wait_for_shutdown_signal().await;

    info!("shutdown signal received, stopping scheduler");
    scheduler.stop().await;
    connections.shutdown(std::time::Duration::from_secs(10)).await;

    info!("metersync stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
