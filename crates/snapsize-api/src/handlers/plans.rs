use axum::{response::IntoResponse, Json};
use serde::Serialize;
use snapsize_core::admission::usable_categories;
use snapsize_core::models::{CategoryLocks, OptionCategory, PlanKind, PlanLimits};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct PlanInfo {
    pub kind: PlanKind,
    pub limits: PlanLimits,
    pub category_locks: CategoryLocks,
    pub usable_categories: Vec<OptionCategory>,
}

pub fn plan_table() -> Vec<PlanInfo> {
    PlanKind::ALL
        .into_iter()
        .map(|kind| {
            let category_locks = CategoryLocks::for_plan(kind);
            PlanInfo {
                kind,
                limits: kind.limits(),
                usable_categories: usable_categories(&category_locks),
                category_locks,
            }
        })
        .collect()
}

/// Plan tiers with their limits and option category locks
#[utoipa::path(
    get,
    path = "/api/v0/plans",
    tag = "plans",
    responses(
        (status = 200, description = "Plan table", body = [PlanInfo])
    )
)]
pub async fn list_plans() -> impl IntoResponse {
    Json(plan_table())
}
