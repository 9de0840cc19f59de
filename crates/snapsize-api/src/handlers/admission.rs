use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use snapsize_core::admission::usable_categories;
use snapsize_core::models::{LimitKind, OptionCategory, PlanTier, RequestedFile};
use snapsize_core::{evaluate, AdmissionDecision, AdmissionRequest, AppError};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{HttpAppError, ValidatedJson};
use crate::extractors::AccountId;
use crate::state::AppState;
use snapsize_infra::ErrorResponse;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdmissionCheckRequest {
    #[serde(alias = "requestedFiles")]
    #[validate(length(min = 1, message = "At least one file is required"), nested)]
    pub requested_files: Vec<RequestedFile>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdmissionResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LimitKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    pub using_fallback: bool,
    pub usable_categories: Vec<OptionCategory>,
}

/// Fresh snapshot for the account, then a pure admission decision over `sizes`.
pub(crate) async fn admit(
    state: &AppState,
    account_id: Uuid,
    sizes: Vec<u64>,
) -> Result<(PlanTier, AdmissionDecision), AppError> {
    let quota = state.ledger.snapshot(account_id).await?;
    let tier = PlanTier::new(quota.plan, quota.credit_balance);
    let decision = evaluate(&tier, &quota, &AdmissionRequest::from_sizes(sizes), Utc::now());

    tracing::debug!(
        plan = %tier.kind,
        allowed = decision.allowed,
        reason = ?decision.reason,
        remaining = ?decision.remaining,
        using_fallback = decision.using_fallback,
        "Admission evaluated"
    );
    Ok((tier, decision))
}

/// Check whether a batch would be admitted. Nothing is debited.
#[utoipa::path(
    post,
    path = "/api/v0/admission",
    tag = "admission",
    request_body = AdmissionCheckRequest,
    params(("X-Account-Id" = String, Header, description = "Calling account")),
    responses(
        (status = 200, description = "Admission decision", body = AdmissionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Missing account identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(account_id = %account.0, file_count = request.requested_files.len(), operation = "check_admission")
)]
pub async fn check_admission(
    account: AccountId,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<AdmissionCheckRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let sizes = request.requested_files.iter().map(|f| f.size).collect();
    let (tier, decision) = admit(&state, account.0, sizes).await?;

    Ok(Json(AdmissionResponse {
        allowed: decision.allowed,
        reason: decision.reason,
        remaining: decision.remaining,
        using_fallback: decision.using_fallback,
        usable_categories: usable_categories(&tier.category_locks),
    }))
}
