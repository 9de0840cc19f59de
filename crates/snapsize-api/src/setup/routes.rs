//! Route configuration and setup

use crate::api_doc;
use crate::constants::{API_PREFIX, OPENAPI_PATH, STORAGE_ROUTE};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Json, Router,
};
use snapsize_core::Config;
use snapsize_infra::{
    request_id_middleware, require_service_key, security_headers_middleware, SecurityHeaders,
    ServiceKey,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub async fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let mut api = account_routes();
    if state.local_storage.is_some() {
        api = api.merge(transfer_routes(config.max_request_body_bytes()));
    }
    match config.service_api_key() {
        Some(key) => {
            api = api.merge(internal_routes(ServiceKey(key.to_string())));
            tracing::info!("Internal account routes enabled");
        }
        None => tracing::info!("SERVICE_API_KEY not set, internal account routes disabled"),
    }

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);

    let app = health_routes()
        .nest(API_PREFIX, api)
        .with_state(state)
        .route(OPENAPI_PATH, get(|| async { Json(api_doc::get_openapi_spec()) }))
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.max_request_body_bytes()))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(http_span))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            SecurityHeaders {
                hsts: config.is_production(),
            },
            security_headers_middleware,
        ));

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|_| anyhow::anyhow!("Invalid CORS origin: {}", o))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness_check))
        .route("/health/ready", get(handlers::health::readiness_check))
}

/// Routes acting on behalf of the calling account (`X-Account-Id`)
fn account_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plans", get(handlers::plans::list_plans))
        .route("/quota", get(handlers::quota::get_quota))
        .route("/admission", post(handlers::admission::check_admission))
        .route("/batches", post(handlers::batches::create_batch))
        .route("/batches/{batch_id}", delete(handlers::batches::cancel_batch))
        .route(
            "/batches/{batch_id}/process",
            post(handlers::batches::process_batch),
        )
}

/// Request span without the query string; transfer URLs carry their signature there.
fn http_span(request: &Request) -> tracing::Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

/// Signed upload and download for the local backend
fn transfer_routes(max_body_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/{{*key}}", STORAGE_ROUTE),
            get(handlers::storage::get_object).put(handlers::storage::put_object),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Account administration for the billing collaborator, behind the service key
fn internal_routes(key: ServiceKey) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/internal/accounts/{account_id}/plan",
            put(handlers::internal::set_plan),
        )
        .route(
            "/internal/accounts/{account_id}/credits",
            post(handlers::internal::grant_credits),
        )
        .layer(axum::middleware::from_fn_with_state(key, require_service_key))
}
