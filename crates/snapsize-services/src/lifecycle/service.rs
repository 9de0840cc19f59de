use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use snapsize_core::models::{ArchiveFormat, ArchiveManifest, BatchOutcome};
use snapsize_core::AppError;
use snapsize_storage::keys::archive_key;
use snapsize_storage::{redact_url, Storage};
use std::sync::Arc;

/// Persists finished archives, issues their download URLs and removes temporary uploads.
///
/// Steps run strictly in order: temporary objects are only deleted once the archive
/// write has been acknowledged.
pub struct StorageLifecycleManager {
    storage: Arc<dyn Storage>,
    download_ttl: Duration,
    worker_limit: usize,
}

/// Archive to persist for one batch
pub struct FinishedArchive<'a> {
    pub batch_id: &'a str,
    pub bytes: Vec<u8>,
    pub format: ArchiveFormat,
    pub manifest: ArchiveManifest,
    pub files_processed: usize,
}

impl StorageLifecycleManager {
    pub fn new(storage: Arc<dyn Storage>, download_ttl: Duration, worker_limit: usize) -> Self {
        Self {
            storage,
            download_ttl,
            worker_limit: worker_limit.max(1),
        }
    }

    /// `snapsize-YYYYMMDD-HHMMSS.{zip|tar}`
    pub fn archive_file_name(format: ArchiveFormat, now: DateTime<Utc>) -> String {
        format!(
            "snapsize-{}.{}",
            now.format("%Y%m%d-%H%M%S"),
            format.extension()
        )
    }

    /// Write the archive under its batch-scoped key and return the key.
    #[tracing::instrument(skip(self, bytes), fields(batch_id = %batch_id, archive_bytes = bytes.len()))]
    pub async fn persist(
        &self,
        batch_id: &str,
        bytes: Vec<u8>,
        format: ArchiveFormat,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let file_name = Self::archive_file_name(format, now);
        let key = archive_key(batch_id, &file_name);

        self.storage
            .put_attachment(&key, Bytes::from(bytes), format.content_type(), &file_name)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, storage_key = %key, "Failed to persist archive");
                AppError::PersistFailure(format!("Could not store archive for batch {}", batch_id))
            })?;

        tracing::info!(storage_key = %key, "Archive persisted");
        Ok(key)
    }

    /// Time-boxed download capability for a persisted archive.
    pub async fn issue_download_url(
        &self,
        key: &str,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let ttl = self
            .download_ttl
            .to_std()
            .map_err(|_| AppError::Internal("Download URL TTL must be positive".to_string()))?;
        let expires_at = Utc::now() + self.download_ttl;

        let url = self
            .storage
            .presigned_get_url(key, ttl)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, storage_key = %key, "Failed to issue download URL");
                AppError::PersistFailure("Could not issue a download URL".to_string())
            })?;

        tracing::debug!(url = %redact_url(&url), expires_at = %expires_at, "Download URL issued");
        Ok((url, expires_at))
    }

    /// Best-effort delete of temporary objects. Returns how many deletes failed.
    ///
    /// Failures are logged with their key and never escalated.
    pub async fn cleanup_temp(&self, keys: &[String]) -> usize {
        let failures = stream::iter(keys.to_vec())
            .map(|key| {
                let storage = self.storage.clone();
                async move {
                    let result = storage.delete(&key).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.worker_limit)
            .filter_map(|(key, result)| async move { result.err().map(|e| (key, e)) })
            .collect::<Vec<_>>()
            .await;

        for (key, e) in &failures {
            let failure = AppError::CleanupFailure {
                key: key.clone(),
                reason: e.to_string(),
            };
            tracing::error!(storage_key = %key, error = %failure, "Temporary object not deleted");
        }

        tracing::debug!(
            deleted = keys.len() - failures.len(),
            failed = failures.len(),
            "Temporary objects cleaned up"
        );
        failures.len()
    }

    /// Best-effort removal of an archive whose batch could not be charged.
    pub async fn discard_archive(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(error = %e, storage_key = %key, "Failed to discard archive");
        }
    }

    /// Persist, issue the download URL, then clean up the batch's temporary objects.
    pub async fn finalize(
        &self,
        archive: FinishedArchive<'_>,
        temp_keys: &[String],
    ) -> Result<BatchOutcome, AppError> {
        let archive_key = self
            .persist(archive.batch_id, archive.bytes, archive.format, Utc::now())
            .await?;

        let (download_url, expires_at) = match self.issue_download_url(&archive_key).await {
            Ok(issued) => issued,
            Err(e) => {
                self.discard_archive(&archive_key).await;
                return Err(e);
            }
        };

        let cleanup_failures = self.cleanup_temp(temp_keys).await;

        Ok(BatchOutcome {
            archive_key,
            download_url,
            expires_at,
            files_processed: archive.files_processed,
            manifest: archive.manifest,
            cleanup_failures,
        })
    }
}
