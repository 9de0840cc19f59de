use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use snapsize_core::models::{PlanTier, QuotaSnapshot};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::HttpAppError;
use crate::extractors::AccountId;
use crate::state::AppState;
use snapsize_infra::ErrorResponse;

#[derive(Debug, Serialize, ToSchema)]
pub struct QuotaResponse {
    pub quota: QuotaSnapshot,
    pub tier: PlanTier,
    /// Allowance left today, when the plan has a daily limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_today: Option<u64>,
    /// Allowance left this billing period, when the plan has a monthly limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_this_period: Option<u64>,
}

impl QuotaResponse {
    pub fn new(quota: QuotaSnapshot) -> Self {
        let tier = PlanTier::new(quota.plan, quota.credit_balance);
        Self {
            remaining_today: tier
                .daily_limit
                .map(|limit| limit.saturating_sub(quota.used_today)),
            remaining_this_period: tier
                .monthly_limit
                .map(|limit| limit.saturating_sub(quota.used_this_period)),
            quota,
            tier,
        }
    }
}

/// Caller's quota counters, window reset times and plan tier
#[utoipa::path(
    get,
    path = "/api/v0/quota",
    tag = "quota",
    params(("X-Account-Id" = String, Header, description = "Calling account")),
    responses(
        (status = 200, description = "Quota snapshot", body = QuotaResponse),
        (status = 401, description = "Missing account identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(account_id = %account.0, operation = "get_quota"))]
pub async fn get_quota(
    account: AccountId,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let quota = state.ledger.snapshot(account.0).await?;
    tracing::debug!(
        plan = %quota.plan,
        used_today = quota.used_today,
        credit_balance = quota.credit_balance,
        "Quota read"
    );
    Ok(Json(QuotaResponse::new(quota)))
}
