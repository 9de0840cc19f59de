//! Health check handlers

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "healthy", "timeout" or "{prefix}: {error}".
async fn run_check<F, E>(f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(CHECK_TIMEOUT, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub ledger: String,
    pub ledger_backend: String,
    pub storage: String,
    pub pending_batches: usize,
}

/// Service health with dependency detail
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies healthy", body = HealthCheckResponse),
        (status = 503, description = "A dependency is unhealthy", body = HealthCheckResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ledger = run_check(state.ledger.health_check(), "unhealthy").await;
    let storage = run_check(state.storage.health_check(), "unhealthy").await;
    let healthy = ledger == "healthy" && storage == "healthy";

    if !healthy {
        tracing::error!(ledger = %ledger, storage = %storage, "Health check failed");
    }

    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger,
        ledger_backend: state.ledger.backend_name().to_string(),
        storage,
        pending_batches: state.registry.pending_count().await,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Liveness check - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness check - quota ledger and object storage.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ledger = run_check(state.ledger.health_check(), "not_ready").await;
    let storage = run_check(state.storage.health_check(), "not_ready").await;
    let ready = ledger == "healthy" && storage == "healthy";

    let status = if ready {
        StatusCode::OK
    } else {
        tracing::error!(ledger = %ledger, storage = %storage, "Readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "ledger": ledger,
            "storage": storage,
        })),
    )
}
