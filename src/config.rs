// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    db::{PgLeaveRepository, PgLedgerRepository, PgNotificationSink, PgUserDirectory},
    services::{AbsenceService, LeaveService, PointsLedger},
    workflow::HttpWorkflowClient,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub workflow_base_url: String,
    pub workflow_api_key: Option<String>,
    pub workflow_timeout: Duration,
    // Zero disables the background reconciliation loop.
    pub reconcile_interval: Duration,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 5)?,
            db_acquire_timeout: Duration::from_secs(parsed_or("DB_ACQUIRE_TIMEOUT_SECS", 3)?),
            workflow_base_url: required("WORKFLOW_BASE_URL")?,
            workflow_api_key: env::var("WORKFLOW_API_KEY").ok().filter(|k| !k.is_empty()),
            workflow_timeout: Duration::from_secs(parsed_or("WORKFLOW_TIMEOUT_SECS", 10)?),
            reconcile_interval: Duration::from_secs(parsed_or("RECONCILE_INTERVAL_SECS", 60)?),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub leave_service: LeaveService,
    pub points_ledger: PointsLedger,
    pub absence_service: AbsenceService,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("failed to connect to the database")?;

        tracing::info!("database connection established");

        // --- Dependency graph ---
        let leave_repo = Arc::new(PgLeaveRepository::new(db_pool.clone()));
        let ledger_repo = Arc::new(PgLedgerRepository::new(db_pool.clone()));
        let users = Arc::new(PgUserDirectory::new(db_pool.clone()));
        let notifier = Arc::new(PgNotificationSink::new(db_pool.clone()));
        let workflow = Arc::new(HttpWorkflowClient::new(
            &config.workflow_base_url,
            config.workflow_api_key.as_deref(),
            config.workflow_timeout,
        )?);

        let leave_service = LeaveService::new(leave_repo, users, workflow, notifier)
            .with_adapter_timeout(config.workflow_timeout);
        let points_ledger = PointsLedger::new(ledger_repo.clone());
        let absence_service = AbsenceService::new(ledger_repo);

        Ok(Self {
            db_pool,
            leave_service,
            points_ledger,
            absence_service,
        })
    }
}
