//! Batch lifecycle handlers: issue upload slots, process, cancel

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snapsize_core::models::{OutputFormat, ProcessFile, ProcessingOptions, RequestedFile};
use snapsize_core::{check_category_gating, AppError};
use snapsize_services::CancelOutcome;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{HttpAppError, ValidatedJson};
use crate::extractors::AccountId;
use crate::handlers::admission::admit;
use crate::state::AppState;
use snapsize_infra::ErrorResponse;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, message = "At least one file is required"), nested)]
    pub files: Vec<RequestedFile>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SlotResponse {
    pub file_name: String,
    /// Bearer capability: PUT the file bytes here with the declared content type
    pub upload_url: String,
    pub key: String,
    pub content_type: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateBatchResponse {
    pub batch_id: String,
    pub slots: Vec<SlotResponse>,
    /// The batch must be processed before this time
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessBatchRequest {
    pub files: Vec<ProcessFile>,
    #[serde(default)]
    pub options: ProcessingOptions,
    /// Shorthand for `options.format`
    #[serde(default)]
    pub format: Option<OutputFormat>,
    /// Shorthand for `options.naming.omit_original_name`
    #[serde(default, alias = "omitFilename")]
    pub omit_filename: Option<bool>,
}

impl ProcessBatchRequest {
    /// Fold the top-level shorthands into the options and normalize them.
    fn effective_options(&self) -> ProcessingOptions {
        let mut options = self.options.clone();
        if let Some(format) = self.format {
            options.format = format;
        }
        if let Some(omit) = self.omit_filename {
            options.naming.omit_original_name = omit;
        }
        options.normalized()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessBatchResponse {
    pub success: bool,
    /// Bearer capability for the finished archive
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub files_processed: usize,
    /// Sum of each source's largest variant, in bytes
    pub size: u64,
    pub archive_key: String,
    pub entry_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelBatchResponse {
    pub batch_id: String,
    /// `cancelled` when the batch was waiting, `cancelling` when it was in flight
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_failures: Option<usize>,
}

/// Admit a batch and issue one upload slot per file
#[utoipa::path(
    post,
    path = "/api/v0/batches",
    tag = "batches",
    request_body = CreateBatchRequest,
    params(("X-Account-Id" = String, Header, description = "Calling account")),
    responses(
        (status = 201, description = "Upload slots issued", body = CreateBatchResponse),
        (status = 400, description = "Invalid input or batch too large", body = ErrorResponse),
        (status = 401, description = "Missing account identity", body = ErrorResponse),
        (status = 402, description = "Not enough credits", body = ErrorResponse),
        (status = 403, description = "Trial expired or subscription ended", body = ErrorResponse),
        (status = 413, description = "A file exceeds the plan's size limit", body = ErrorResponse),
        (status = 415, description = "Unsupported content type", body = ErrorResponse),
        (status = 429, description = "Daily or monthly limit reached", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(account_id = %account.0, file_count = request.files.len(), operation = "create_batch")
)]
pub async fn create_batch(
    account: AccountId,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateBatchRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let sizes = request.files.iter().map(|f| f.size).collect();
    let (_, decision) = admit(&state, account.0, sizes).await?;
    decision.into_result()?;

    let batch = state.broker.issue(account.0, &request.files).await?;
    let response = CreateBatchResponse {
        batch_id: batch.batch_id.clone(),
        slots: batch
            .slots
            .iter()
            .map(|slot| SlotResponse {
                file_name: slot.original_file_name.clone(),
                upload_url: slot.upload_url.clone(),
                key: slot.key.clone(),
                content_type: slot.content_type.clone(),
                expires_at: slot.expires_at,
            })
            .collect(),
        expires_at: batch.expires_at,
    };

    state.registry.register(batch).await;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Generate variants for every uploaded file and return a download URL for the archive
#[utoipa::path(
    post,
    path = "/api/v0/batches/{batch_id}/process",
    tag = "batches",
    request_body = ProcessBatchRequest,
    params(
        ("batch_id" = String, Path, description = "Batch ID from the upload-slot response"),
        ("X-Account-Id" = String, Header, description = "Calling account")
    ),
    responses(
        (status = 200, description = "Archive ready", body = ProcessBatchResponse),
        (status = 400, description = "Invalid input or locked option category", body = ErrorResponse),
        (status = 402, description = "Not enough credits", body = ErrorResponse),
        (status = 429, description = "Daily or monthly limit reached", body = ErrorResponse),
        (status = 404, description = "Batch not found or expired", body = ErrorResponse),
        (status = 413, description = "An uploaded file exceeds the plan's size limit", body = ErrorResponse),
        (status = 422, description = "A source file failed validation", body = ErrorResponse),
        (status = 500, description = "Processing failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(account_id = %account.0, batch_id = %batch_id, file_count = request.files.len(), operation = "process_batch")
)]
pub async fn process_batch(
    account: AccountId,
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
    ValidatedJson(request): ValidatedJson<ProcessBatchRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.files.is_empty() {
        return Err(AppError::InvalidInput("At least one file is required".to_string()).into());
    }
    let options = request.effective_options();

    let sizes = request.files.iter().map(|f| f.size).collect();
    let (tier, decision) = admit(&state, account.0, sizes).await?;
    check_category_gating(&tier.category_locks, &options)?;
    let debit = decision.into_result()?;

    let lease = state.registry.take(&batch_id, account.0, Utc::now()).await?;

    let outcome = match state
        .pipeline
        .run(&lease, &request.files, &options, tier.max_file_size_bytes)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            state.registry.restore(lease, Utc::now()).await;
            return Err(e.into());
        }
    };
    state.registry.complete(lease).await;

    // Only a completed batch is charged. A debit that lost a race against another
    // batch of the same account is refused and the archive withdrawn.
    if let Err(e) = state
        .ledger
        .debit(account.0, debit, &tier.limits())
        .await
    {
        tracing::warn!(
            error = %e,
            archive_key = %outcome.archive_key,
            "Debit refused after processing, discarding archive"
        );
        state.lifecycle.discard_archive(&outcome.archive_key).await;
        return Err(e.into());
    }

    tracing::info!(
        files_processed = outcome.files_processed,
        entry_count = outcome.manifest.entry_count(),
        bytes_represented = outcome.manifest.bytes_represented,
        allowance_debited = debit.allowance,
        credits_debited = debit.credits,
        cleanup_failures = outcome.cleanup_failures,
        "Batch processed"
    );

    Ok(Json(ProcessBatchResponse {
        success: true,
        download_url: outcome.download_url,
        expires_at: outcome.expires_at,
        files_processed: outcome.files_processed,
        size: outcome.manifest.bytes_represented,
        archive_key: outcome.archive_key,
        entry_count: outcome.manifest.entry_count(),
    }))
}

/// Cancel a batch. Waiting batches are dropped and their uploads deleted; a batch in
/// flight stops at its next checkpoint.
#[utoipa::path(
    delete,
    path = "/api/v0/batches/{batch_id}",
    tag = "batches",
    params(
        ("batch_id" = String, Path, description = "Batch ID"),
        ("X-Account-Id" = String, Header, description = "Calling account")
    ),
    responses(
        (status = 200, description = "Batch cancelled", body = CancelBatchResponse),
        (status = 202, description = "Cancellation requested for a running batch", body = CancelBatchResponse),
        (status = 404, description = "Batch not found or expired", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(account_id = %account.0, batch_id = %batch_id, operation = "cancel_batch"))]
pub async fn cancel_batch(
    account: AccountId,
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    match state.registry.cancel(&batch_id, account.0).await? {
        CancelOutcome::Removed(batch) => {
            let keys: Vec<String> = batch.keys().map(String::from).collect();
            let cleanup_failures = state.lifecycle.cleanup_temp(&keys).await;
            tracing::info!(cleanup_failures, "Batch cancelled");
            Ok((
                StatusCode::OK,
                Json(CancelBatchResponse {
                    batch_id,
                    status: "cancelled".to_string(),
                    cleanup_failures: Some(cleanup_failures),
                }),
            ))
        }
        CancelOutcome::InFlight => {
            tracing::info!("Cancellation requested for running batch");
            Ok((
                StatusCode::ACCEPTED,
                Json(CancelBatchResponse {
                    batch_id,
                    status: "cancelling".to_string(),
                    cleanup_failures: None,
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsize_core::models::FolderOrganization;

    #[test]
    fn test_shorthands_fold_into_options() {
        let request: ProcessBatchRequest = serde_json::from_str(
            r#"{
                "files": [{"key": "temp/b/a.jpg", "originalName": "a.jpg", "size": 10}],
                "format": "webp",
                "omitFilename": true,
                "options": {"folder_organization": "flat"}
            }"#,
        )
        .unwrap();

        let options = request.effective_options();
        assert_eq!(options.format, OutputFormat::Webp);
        assert!(options.naming.omit_original_name);
        assert_eq!(options.folder_organization, FolderOrganization::Flat);
        assert_eq!(request.files[0].original_name, "a.jpg");
    }

    #[test]
    fn test_options_default_when_absent() {
        let request: ProcessBatchRequest =
            serde_json::from_str(r#"{"files": []}"#).unwrap();
        assert_eq!(
            request.effective_options(),
            ProcessingOptions::default().normalized()
        );
    }
}
