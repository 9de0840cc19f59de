use chrono::{Duration, Utc};
use futures::future::try_join_all;
use snapsize_core::models::{Batch, RequestedFile, UploadSlot};
use snapsize_core::AppError;
use snapsize_processing::MediaValidator;
use snapsize_storage::keys::temp_key;
use snapsize_storage::Storage;
use std::sync::Arc;
use uuid::Uuid;

/// Issues upload slots for an admitted batch.
///
/// No file bytes pass through here; the broker only hands out time-boxed PUT
/// capabilities scoped to one temporary key each.
pub struct UploadBroker {
    storage: Arc<dyn Storage>,
    validator: MediaValidator,
    upload_ttl: Duration,
    batch_ttl: Duration,
}

impl UploadBroker {
    pub fn new(storage: Arc<dyn Storage>, upload_ttl: Duration, batch_ttl: Duration) -> Self {
        Self {
            storage,
            validator: MediaValidator::default(),
            upload_ttl,
            batch_ttl,
        }
    }

    /// Create a batch id and one slot per file.
    ///
    /// All or nothing: if any slot cannot be authorized the whole batch is rejected.
    #[tracing::instrument(skip(self, files), fields(account_id = %account_id, file_count = files.len()))]
    pub async fn issue(
        &self,
        account_id: Uuid,
        files: &[RequestedFile],
    ) -> Result<Batch, AppError> {
        let names = self
            .validator
            .validate_batch_names(files.iter().map(|f| f.name.as_str()))?;

        let content_types = files
            .iter()
            .zip(&names)
            .map(|(file, name)| {
                self.validator
                    .validate_content_type(&file.content_type)
                    .map_err(|e| AppError::UnsupportedFormat {
                        file_name: name.clone(),
                        detail: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ttl = self
            .upload_ttl
            .to_std()
            .map_err(|_| AppError::Internal("Upload URL TTL must be positive".to_string()))?;

        let batch_id = hex::encode(rand::random::<[u8; 16]>());
        let now = Utc::now();
        let slot_expires_at = now + self.upload_ttl;

        let declared = files.iter().map(|f| f.size);
        let slots = try_join_all(names.into_iter().zip(content_types).zip(declared).map(
            |((name, content_type), declared_size)| {
                let key = temp_key(&batch_id, &name);
                async move {
                    let upload_url = self
                        .storage
                        .presigned_put_url(&key, &content_type, ttl)
                        .await
                        .map_err(|e| {
                            tracing::warn!(
                                error = %e,
                                storage_key = %key,
                                "Failed to authorize upload slot"
                            );
                            AppError::UploadAuthorizationFailed(format!(
                                "Could not authorize upload of {}",
                                name
                            ))
                        })?;

                    Ok::<_, AppError>(UploadSlot {
                        key,
                        original_file_name: name,
                        content_type,
                        declared_size,
                        upload_url,
                        expires_at: slot_expires_at,
                    })
                }
            },
        ))
        .await?;

        tracing::info!(
            batch_id = %batch_id,
            slot_count = slots.len(),
            expires_at = %slot_expires_at,
            "Upload slots issued"
        );

        Ok(Batch {
            batch_id,
            account_id,
            slots,
            created_at: now,
            expires_at: now + self.batch_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStorage;

    fn file(name: &str, content_type: &str) -> RequestedFile {
        RequestedFile {
            name: name.to_string(),
            size: 1024,
            content_type: content_type.to_string(),
        }
    }

    fn broker(storage: Arc<MemoryStorage>) -> UploadBroker {
        UploadBroker::new(storage, Duration::minutes(15), Duration::minutes(60))
    }

    #[tokio::test]
    async fn test_issue_scopes_slots_to_batch() {
        let storage = Arc::new(MemoryStorage::default());
        let account = Uuid::new_v4();
        let batch = broker(storage)
            .issue(
                account,
                &[
                    file("photo.jpg", "image/jpeg"),
                    file("../../etc/logo.png", "image/PNG"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(batch.batch_id.len(), 32);
        assert!(batch.batch_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(batch.account_id, account);
        assert_eq!(batch.slots.len(), 2);

        let logo = &batch.slots[1];
        assert_eq!(logo.key, format!("temp/{}/logo.png", batch.batch_id));
        assert_eq!(logo.original_file_name, "logo.png");
        assert_eq!(logo.content_type, "image/png");
        assert!(logo.upload_url.contains("method=PUT"));
        assert!(logo.expires_at < batch.expires_at);
    }

    #[tokio::test]
    async fn test_batch_ids_are_unique() {
        let broker = broker(Arc::new(MemoryStorage::default()));
        let files = [file("a.jpg", "image/jpeg")];
        let first = broker.issue(Uuid::nil(), &files).await.unwrap();
        let second = broker.issue(Uuid::nil(), &files).await.unwrap();
        assert_ne!(first.batch_id, second.batch_id);
    }

    #[tokio::test]
    async fn test_unsupported_content_type_names_file() {
        let err = broker(Arc::new(MemoryStorage::default()))
            .issue(
                Uuid::nil(),
                &[file("a.jpg", "image/jpeg"), file("scan.tiff", "image/tiff")],
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::UnsupportedFormat { ref file_name, .. } if file_name == "scan.tiff")
        );
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let err = broker(Arc::new(MemoryStorage::default()))
            .issue(
                Uuid::nil(),
                &[file("a.jpg", "image/jpeg"), file("x/a.jpg", "image/jpeg")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_authorization_failure_rejects_whole_batch() {
        let storage = Arc::new(MemoryStorage::default());
        storage.refuse_presign_for("/b.png");

        let err = broker(storage)
            .issue(
                Uuid::nil(),
                &[file("a.jpg", "image/jpeg"), file("b.png", "image/png")],
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::UploadAuthorizationFailed(ref msg) if msg.contains("b.png"))
        );
    }
}
