//! HTTP error response body
//!
//! Note: `IntoResponse` for `AppError` lives in the API crate because of the orphan
//! rule; this crate only owns the serialized shape.

use serde::Serialize;
use snapsize_core::models::LimitKind;
use utoipa::ToSchema;

/// Standard error response format for HTTP APIs
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable code, e.g. `DAILY_LIMIT_EXCEEDED`
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Set for admission denials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LimitKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    /// Source file that failed, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}
