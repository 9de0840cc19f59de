//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use snapsize_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid or expired signature")]
    InvalidSignature,

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::InvalidSignature => {
                AppError::Unauthorized("Invalid or expired signature".to_string())
            }
            StorageError::SigningFailed(msg) => AppError::UploadAuthorizationFailed(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// Keys are opaque, `/`-separated object paths. Temporary uploads live under
/// `temp/{batch_id}/` and finished archives under `archives/{batch_id}/`; see the
/// `keys` module.
///
/// Presigned URLs are bearer capabilities. Never log them in full; use
/// [`crate::redact_url`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write an object, replacing any previous object at the same key
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Write an object that downloads as an attachment named `file_name`
    async fn put_attachment(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        file_name: &str,
    ) -> StorageResult<()>;

    /// Read a whole object into memory
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Time-boxed GET capability for one key
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Time-boxed PUT capability for one key and content type
    async fn presigned_put_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Readiness check
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// `attachment` content disposition with a quoted file name
pub fn attachment_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsize_core::ErrorMetadata;

    #[test]
    fn test_attachment_disposition_strips_quotes() {
        assert_eq!(
            attachment_disposition("snapsize-20260314-120000.zip"),
            "attachment; filename=\"snapsize-20260314-120000.zip\""
        );
        assert_eq!(
            attachment_disposition("a\"b\\c.zip"),
            "attachment; filename=\"abc.zip\""
        );
    }

    #[test]
    fn test_storage_error_maps_to_app_error() {
        let err: AppError = StorageError::NotFound("temp/x/a.jpg".to_string()).into();
        assert_eq!(err.http_status_code(), 404);

        let err: AppError = StorageError::SigningFailed("no credentials".to_string()).into();
        assert_eq!(err.error_code(), "UPLOAD_AUTHORIZATION_FAILED");

        let err: AppError = StorageError::UploadFailed("timeout".to_string()).into();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }
}
