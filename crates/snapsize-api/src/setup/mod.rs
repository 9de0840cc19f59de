//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use snapsize_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    snapsize_infra::init_telemetry(config.log_format(), config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let ledger = database::setup_ledger(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = services::initialize_services(&config, ledger, storage);
    services::spawn_registry_sweeper(state.registry.clone());

    let router = routes::setup_routes(&config, state.clone()).await?;

    Ok((state, router))
}
