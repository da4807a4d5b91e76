// src/main.rs

use hr_core::config::{AppConfig, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let app_state = AppState::new(&config).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("database migrations applied");

    if config.reconcile_interval.is_zero() {
        tracing::info!("reconciliation loop disabled, exiting");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.reconcile_interval);
    tracing::info!(interval_secs = config.reconcile_interval.as_secs(), "reconciliation worker started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match app_state.leave_service.reconcile_unsettled().await {
                    Ok(0) => tracing::debug!("reconciliation pass: nothing changed"),
                    Ok(changed) => tracing::info!(changed, "reconciliation pass finished"),
                    Err(e) => tracing::warn!(error = %e, "reconciliation pass failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    app_state.db_pool.close().await;
    Ok(())
}
