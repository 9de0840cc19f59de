//! OpenAPI documentation

use utoipa::OpenApi;

use crate::handlers;
use snapsize_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Snapsize API",
        version = "0.1.0",
        description = "Batch image variant service. Admit a batch against the account's plan, upload sources through time-boxed URLs, then process them into one archive of resized variants. Account routes are versioned under /api/v0/ and expect the X-Account-Id header."
    ),
    paths(
        handlers::health::health_check,
        handlers::plans::list_plans,
        handlers::quota::get_quota,
        handlers::admission::check_admission,
        handlers::batches::create_batch,
        handlers::batches::process_batch,
        handlers::batches::cancel_batch,
        handlers::storage::put_object,
        handlers::storage::get_object,
        handlers::internal::set_plan,
        handlers::internal::grant_credits,
    ),
    components(schemas(
        snapsize_infra::ErrorResponse,
        handlers::health::HealthCheckResponse,
        handlers::plans::PlanInfo,
        handlers::quota::QuotaResponse,
        handlers::admission::AdmissionCheckRequest,
        handlers::admission::AdmissionResponse,
        handlers::batches::CreateBatchRequest,
        handlers::batches::CreateBatchResponse,
        handlers::batches::SlotResponse,
        handlers::batches::ProcessBatchRequest,
        handlers::batches::ProcessBatchResponse,
        handlers::batches::CancelBatchResponse,
        handlers::internal::GrantCreditsRequest,
        models::RequestedFile,
        models::ProcessFile,
        models::ProcessingOptions,
        models::PlanUpdate,
        models::QuotaSnapshot,
        models::PlanTier,
        models::LimitKind,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "plans", description = "Plan tiers and option category locks"),
        (name = "quota", description = "Account quota"),
        (name = "admission", description = "Admission checks"),
        (name = "batches", description = "Upload slots, processing and cancellation"),
        (name = "storage", description = "Signed transfers for the local storage backend"),
        (name = "internal", description = "Account administration for billing (service key)")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_batch_routes() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/v0/batches"));
        assert!(spec
            .paths
            .paths
            .contains_key("/api/v0/batches/{batch_id}/process"));
        assert!(spec.paths.paths.contains_key("/health"));
    }
}
