//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>` and use `?` on anything
//! convertible into `AppError`, so every failure renders the same way.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use snapsize_core::{AppError, ErrorMetadata, LogLevel};
use snapsize_infra::ErrorResponse;
use snapsize_storage::StorageError;

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rule: both the trait and `AppError` are foreign to this crate)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// JSON body deserialization failures become a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that rejects with our ErrorResponse shape instead of axum's
/// plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

/// Build the response body for an error.
///
/// Admission denials always carry their reason and remaining allowance; internal
/// details are only exposed outside production and for non-sensitive errors.
pub fn error_body(app_error: &AppError, is_production: bool) -> ErrorResponse {
    let (reason, remaining) = match app_error.admission_limit() {
        Some((kind, remaining)) => (Some(kind), remaining),
        None => (None, None),
    };
    let file_name = match app_error {
        AppError::InvalidImage { file_name, .. }
        | AppError::DimensionExceeded { file_name, .. }
        | AppError::UnsupportedFormat { file_name, .. } => Some(file_name.clone()),
        _ => None,
    };
    let show_details = !is_production && !app_error.is_sensitive();

    ErrorResponse {
        error: app_error.client_message(),
        code: app_error.error_code().to_string(),
        recoverable: app_error.is_recoverable(),
        suggested_action: app_error.suggested_action().map(String::from),
        reason,
        remaining,
        file_name,
        details: show_details.then(|| app_error.detailed_message()),
        error_type: show_details.then(|| app_error.error_type().to_string()),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        (status, Json(error_body(app_error, is_production_env()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsize_core::models::LimitKind;

    #[test]
    fn test_admission_denial_body() {
        let err = AppError::AdmissionDenied {
            kind: LimitKind::Daily,
            remaining: Some(3),
        };
        let body = error_body(&err, true);
        assert_eq!(body.code, "DAILY_LIMIT_EXCEEDED");
        assert_eq!(body.reason, Some(LimitKind::Daily));
        assert_eq!(body.remaining, Some(3));
        assert!(body.details.is_none());

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["reason"], "daily");
    }

    #[test]
    fn test_sensitive_details_hidden() {
        let err = AppError::PersistFailure("bucket exploded".to_string());
        let body = error_body(&err, false);
        assert!(body.details.is_none());
        assert!(!body.error.contains("bucket"));
    }

    #[test]
    fn test_source_failure_names_file() {
        let err = AppError::InvalidImage {
            file_name: "broken.png".to_string(),
            reason: "truncated".to_string(),
        };
        let body = error_body(&err, false);
        assert_eq!(body.file_name.as_deref(), Some("broken.png"));
        assert!(body.error.contains("broken.png"));
        assert!(body.details.is_some());
    }
}
