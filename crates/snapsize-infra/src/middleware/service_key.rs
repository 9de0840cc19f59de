use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::error::ErrorResponse;

pub const SERVICE_KEY_HEADER: &str = "X-Service-Key";

/// Shared secret that trusted internal callers (billing, support tooling) present.
#[derive(Clone)]
pub struct ServiceKey(pub String);

impl std::fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServiceKey(..)")
    }
}

impl ServiceKey {
    /// Constant-time comparison against a presented key
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();
        expected.len() == presented.len() && bool::from(expected.ct_eq(presented))
    }
}

/// Rejects requests that do not carry the service key.
///
/// Mount with `axum::middleware::from_fn_with_state(key, require_service_key)`.
pub async fn require_service_key(
    State(key): State<ServiceKey>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    match presented {
        Some(value) if key.matches(value) => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Internal route called without a valid service key");
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Unauthorized".to_string(),
                    code: "UNAUTHORIZED".to_string(),
                    recoverable: false,
                    suggested_action: None,
                    reason: None,
                    remaining: None,
                    file_name: None,
                    details: None,
                    error_type: None,
                }),
            )
                .into_response()
        }
    }
}
