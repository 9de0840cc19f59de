//! Signed transfer routes for the local storage backend
//!
//! S3 clients talk to the bucket directly through presigned URLs. The local backend
//! hands out URLs pointing here instead, carrying an HMAC over method, key, expiry and
//! (for uploads) content type.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use snapsize_core::AppError;
use snapsize_storage::{LocalStorage, SignedMethod, Storage};
use std::sync::Arc;
use utoipa::IntoParams;

use crate::error::HttpAppError;
use crate::state::AppState;
use snapsize_infra::ErrorResponse;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransferQuery {
    pub method: String,
    pub expires: i64,
    pub signature: String,
}

fn local_backend(state: &AppState) -> Result<&Arc<LocalStorage>, AppError> {
    state
        .local_storage
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Transfer route is not available".to_string()))
}

fn verify(
    local: &LocalStorage,
    expected: SignedMethod,
    key: &str,
    query: &TransferQuery,
    content_type: &str,
) -> Result<(), HttpAppError> {
    if SignedMethod::parse(&query.method) != Some(expected) {
        return Err(AppError::Unauthorized("Invalid or expired signature".to_string()).into());
    }
    local.verify_transfer(expected, key, query.expires, content_type, &query.signature)?;
    Ok(())
}

/// Upload an object through a signed URL
#[utoipa::path(
    put,
    path = "/api/v0/storage/{key}",
    tag = "storage",
    params(("key" = String, Path, description = "Object key"), TransferQuery),
    request_body(content = Vec<u8>, description = "Object bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Object stored"),
        (status = 401, description = "Invalid or expired signature", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query, headers, body), fields(storage_key = %key, size_bytes = body.len()))]
pub async fn put_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<TransferQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let local = local_backend(&state)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    verify(local, SignedMethod::Put, &key, &query, &content_type)?;
    local.put(&key, body, &content_type).await?;

    tracing::debug!(content_type = %content_type, "Object uploaded through signed URL");
    Ok(StatusCode::OK)
}

/// Download an object through a signed URL
#[utoipa::path(
    get,
    path = "/api/v0/storage/{key}",
    tag = "storage",
    params(("key" = String, Path, description = "Object key"), TransferQuery),
    responses(
        (status = 200, description = "Object bytes", content_type = "application/octet-stream"),
        (status = 401, description = "Invalid or expired signature", body = ErrorResponse),
        (status = 404, description = "Object not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(storage_key = %key))]
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<TransferQuery>,
) -> Result<Response, HttpAppError> {
    let local = local_backend(&state)?;
    verify(local, SignedMethod::Get, &key, &query, "")?;

    let object = local.get_object(&key).await?;
    let mut response = object.data.into_response();
    let headers = response.headers_mut();

    let content_type = object
        .metadata
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(value) = object
        .metadata
        .content_disposition
        .as_deref()
        .and_then(|d| HeaderValue::from_str(d).ok())
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
