//! Account administration for the billing collaborator
//!
//! Mounted only when `SERVICE_API_KEY` is configured, behind the service key gate.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use snapsize_core::models::PlanUpdate;
use snapsize_core::AppError;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::quota::QuotaResponse;
use crate::state::AppState;
use snapsize_infra::ErrorResponse;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GrantCreditsRequest {
    #[validate(range(min = 1, max = 1_000_000, message = "Credits must be between 1 and 1000000"))]
    pub credits: u64,
}

/// Set an account's plan and billing status
#[utoipa::path(
    put,
    path = "/api/v0/internal/accounts/{account_id}/plan",
    tag = "internal",
    request_body = PlanUpdate,
    params(
        ("account_id" = Uuid, Path, description = "Account ID"),
        ("X-Service-Key" = String, Header, description = "Service API key")
    ),
    responses(
        (status = 200, description = "Plan updated", body = QuotaResponse),
        (status = 401, description = "Invalid service key", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, update), fields(account_id = %account_id, plan = %update.plan, operation = "set_plan"))]
pub async fn set_plan(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
    ValidatedJson(update): ValidatedJson<PlanUpdate>,
) -> Result<impl IntoResponse, HttpAppError> {
    let quota = state.ledger.set_plan(account_id, update).await?;
    tracing::info!(billing_status = ?quota.billing_status, "Account plan updated");
    Ok(Json(QuotaResponse::new(quota)))
}

/// Add pay-as-you-go credits to an account
#[utoipa::path(
    post,
    path = "/api/v0/internal/accounts/{account_id}/credits",
    tag = "internal",
    request_body = GrantCreditsRequest,
    params(
        ("account_id" = Uuid, Path, description = "Account ID"),
        ("X-Service-Key" = String, Header, description = "Service API key")
    ),
    responses(
        (status = 200, description = "Credits granted", body = QuotaResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid service key", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(account_id = %account_id, operation = "grant_credits"))]
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<GrantCreditsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let quota = state.ledger.grant_credits(account_id, request.credits).await?;
    tracing::info!(
        credits = request.credits,
        credit_balance = quota.credit_balance,
        "Credits granted"
    );
    Ok(Json(QuotaResponse::new(quota)))
}
