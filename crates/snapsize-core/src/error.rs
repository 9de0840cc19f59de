//! Error types module
//!
//! All failures in the batch pipeline are unified under [`AppError`]. Each variant
//! self-describes its HTTP presentation through [`ErrorMetadata`], so the API layer
//! only has to render what the error reports about itself.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::{LimitKind, OptionCategory};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for quota exhaustion and bad source files
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DAILY_LIMIT_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Admission denied: {kind}")]
    AdmissionDenied {
        kind: LimitKind,
        remaining: Option<u64>,
    },

    #[error("Option category '{0}' is locked for this plan")]
    LockedCategory(OptionCategory),

    #[error("Invalid image {file_name}: {reason}")]
    InvalidImage { file_name: String, reason: String },

    #[error("Image {file_name} is {width}x{height}, exceeding the {max}px limit")]
    DimensionExceeded {
        file_name: String,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("Unsupported format for {file_name}: {detail}")]
    UnsupportedFormat { file_name: String, detail: String },

    #[error("Upload authorization failed: {0}")]
    UploadAuthorizationFailed(String),

    #[error("Archive assembly failed: {0}")]
    ArchiveFailure(String),

    #[error("Archive persist failed: {0}")]
    PersistFailure(String),

    #[error("Cleanup failed for {key}: {reason}")]
    CleanupFailure { key: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

type StaticMetadata = (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
);

/// Admission denials differ per limit kind; everything else is keyed by variant alone.
fn admission_metadata(kind: LimitKind) -> StaticMetadata {
    match kind {
        LimitKind::Daily => (
            429,
            "DAILY_LIMIT_EXCEEDED",
            true,
            Some("Wait for the daily reset or buy more credits"),
            false,
            LogLevel::Warn,
        ),
        LimitKind::Monthly => (
            429,
            "MONTHLY_LIMIT_EXCEEDED",
            true,
            Some("Wait for the monthly reset or buy more credits"),
            false,
            LogLevel::Warn,
        ),
        LimitKind::Batch => (
            400,
            "BATCH_SIZE_EXCEEDED",
            false,
            Some("Split the batch or upgrade your plan"),
            false,
            LogLevel::Debug,
        ),
        LimitKind::FileSize => (
            413,
            "FILE_SIZE_EXCEEDED",
            false,
            Some("Reduce the file size or upgrade your plan"),
            false,
            LogLevel::Debug,
        ),
        LimitKind::Scoops => (
            402,
            "INSUFFICIENT_CREDITS",
            false,
            Some("Buy more credits"),
            false,
            LogLevel::Warn,
        ),
        LimitKind::TrialExpired => (
            403,
            "TRIAL_EXPIRED",
            false,
            Some("Choose a plan to continue"),
            false,
            LogLevel::Debug,
        ),
        LimitKind::SubscriptionEnded => (
            403,
            "SUBSCRIPTION_ENDED",
            false,
            Some("Renew your subscription"),
            false,
            LogLevel::Debug,
        ),
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> StaticMetadata {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::AdmissionDenied { kind, .. } => admission_metadata(*kind),
        AppError::LockedCategory(_) => (
            400,
            "LOCKED_CATEGORY",
            false,
            Some("Upgrade your plan or reset these options to their defaults"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidImage { .. } => (
            422,
            "INVALID_IMAGE",
            false,
            Some("Check the file is a valid image and upload it again"),
            false,
            LogLevel::Warn,
        ),
        AppError::DimensionExceeded { .. } => (
            422,
            "DIMENSION_EXCEEDED",
            false,
            Some("Downscale the image before uploading"),
            false,
            LogLevel::Warn,
        ),
        AppError::UnsupportedFormat { .. } => (
            415,
            "UNSUPPORTED_FORMAT",
            false,
            Some("Use JPEG, PNG, WebP or GIF source images"),
            false,
            LogLevel::Debug,
        ),
        AppError::UploadAuthorizationFailed(_) => (
            502,
            "UPLOAD_AUTHORIZATION_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::ArchiveFailure(_) | AppError::PersistFailure(_) => (
            500,
            "PROCESSING_FAILED",
            true,
            Some("Retry the batch after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::CleanupFailure { .. } => (
            500,
            "CLEANUP_FAILED",
            true,
            None,
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the account or service credentials"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::AdmissionDenied { .. } => "AdmissionDenied",
            AppError::LockedCategory(_) => "LockedCategory",
            AppError::InvalidImage { .. } => "InvalidImage",
            AppError::DimensionExceeded { .. } => "DimensionExceeded",
            AppError::UnsupportedFormat { .. } => "UnsupportedFormat",
            AppError::UploadAuthorizationFailed(_) => "UploadAuthorizationFailed",
            AppError::ArchiveFailure(_) => "ArchiveFailure",
            AppError::PersistFailure(_) => "PersistFailure",
            AppError::CleanupFailure { .. } => "CleanupFailure",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Limit kind and remaining allowance for admission denials.
    pub fn admission_limit(&self) -> Option<(LimitKind, Option<u64>)> {
        match self {
            AppError::AdmissionDenied { kind, remaining } => Some((*kind, *remaining)),
            _ => None,
        }
    }

    /// Failures during variant generation abort the whole batch.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            AppError::InvalidImage { .. }
                | AppError::DimensionExceeded { .. }
                | AppError::UnsupportedFormat { .. }
        )
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

fn admission_message(kind: LimitKind, remaining: Option<u64>) -> String {
    let remaining = remaining.unwrap_or(0);
    match kind {
        LimitKind::Daily => format!(
            "Daily limit reached: {} image(s) remaining today. Buy more credits to process this batch",
            remaining
        ),
        LimitKind::Monthly => format!(
            "Monthly limit reached: {} image(s) remaining this period. Buy more credits to process this batch",
            remaining
        ),
        LimitKind::Batch => "Too many files in this batch for your plan".to_string(),
        LimitKind::FileSize => "A file exceeds the size limit for your plan".to_string(),
        LimitKind::Scoops => format!(
            "Not enough credits: {} credit(s) available",
            remaining
        ),
        LimitKind::TrialExpired => "Your trial has expired".to_string(),
        LimitKind::SubscriptionEnded => "Your subscription has ended".to_string(),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access quota ledger".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::AdmissionDenied { kind, remaining } => admission_message(*kind, *remaining),
            AppError::LockedCategory(category) => format!(
                "The '{}' options are not available on your plan",
                category
            ),
            AppError::InvalidImage { file_name, reason } => {
                format!("Processing failed for {}: {}", file_name, reason)
            }
            AppError::DimensionExceeded {
                file_name,
                width,
                height,
                max,
            } => format!(
                "Processing failed for {}: {}x{} exceeds the {}px limit",
                file_name, width, height, max
            ),
            AppError::UnsupportedFormat { file_name, detail } => {
                format!("Processing failed for {}: {}", file_name, detail)
            }
            AppError::UploadAuthorizationFailed(_) => "Failed to issue upload slots".to_string(),
            AppError::ArchiveFailure(_) | AppError::PersistFailure(_) => {
                "Processing failed".to_string()
            }
            AppError::CleanupFailure { .. } => "Cleanup failed".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::BadRequest(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
