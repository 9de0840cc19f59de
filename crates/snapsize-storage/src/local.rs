use crate::keys::{encode_key_path, validate_key};
use crate::signing::{SignedMethod, UrlSigner};
use crate::traits::{attachment_disposition, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const META_DIR: &str = ".meta";

/// Headers to replay when serving an object, stored next to it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub metadata: ObjectMetadata,
}

/// Local filesystem storage implementation
///
/// Presigned URLs point at the API's transfer route (`base_url`) and carry an HMAC
/// signature over method, key, expiry and content type.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    signer: UrlSigner,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/snapsize")
    /// * `base_url` - Base URL of the transfer route (e.g., "http://localhost:4000/api/v0/storage")
    /// * `signer` - Signs and verifies transfer URLs
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        signer: UrlSigner,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            signer,
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys with traversal sequences or hidden segments, then checks the
    /// resolved path stays under the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        if let Ok(canonical) = path.canonicalize() {
            let base_canonical = self.base_path.canonicalize().map_err(|e| {
                StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
            })?;
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    fn meta_path(&self, storage_key: &str) -> PathBuf {
        self.base_path
            .join(META_DIR)
            .join(format!("{}.json", storage_key))
    }

    fn signed_url(
        &self,
        method: SignedMethod,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.key_to_path(key)?;
        let expires = unix_now() + expires_in.as_secs() as i64;
        let signature = self.signer.sign(method, key, expires, content_type)?;
        Ok(format!(
            "{}/{}?method={}&expires={}&signature={}",
            self.base_url.trim_end_matches('/'),
            encode_key_path(key),
            method.as_str(),
            expires,
            signature
        ))
    }

    /// Check a transfer request carrying a signature from one of our URLs.
    pub fn verify_transfer(
        &self,
        method: SignedMethod,
        key: &str,
        expires: i64,
        content_type: &str,
        signature: &str,
    ) -> StorageResult<()> {
        validate_key(key)?;
        self.signer
            .verify(method, key, expires, content_type, signature, unix_now())
    }

    /// Read an object together with the headers it was stored with.
    pub async fn get_object(&self, storage_key: &str) -> StorageResult<StoredObject> {
        let data = self.get(storage_key).await?;
        let metadata = match fs::read(self.meta_path(storage_key)).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_default(),
            Err(_) => ObjectMetadata::default(),
        };
        Ok(StoredObject { data, metadata })
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_object(
        &self,
        storage_key: &str,
        data: Bytes,
        metadata: ObjectMetadata,
    ) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        let meta_path = self.meta_path(storage_key);
        self.ensure_parent_dir(&meta_path).await?;
        let meta = serde_json::to_vec(&metadata)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;
        fs::write(&meta_path, meta).await?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.write_object(
            key,
            data,
            ObjectMetadata {
                content_type: Some(content_type.to_string()),
                content_disposition: None,
            },
        )
        .await
    }

    async fn put_attachment(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        file_name: &str,
    ) -> StorageResult<()> {
        self.write_object(
            key,
            data,
            ObjectMetadata {
                content_type: Some(content_type.to_string()),
                content_disposition: Some(attachment_disposition(file_name)),
            },
        )
        .await
    }

    async fn get(&self, storage_key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        Ok(Bytes::from(data))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path).await.map_err(|e| {
                StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        let meta_path = self.meta_path(storage_key);
        if fs::try_exists(&meta_path).await.unwrap_or(false) {
            fs::remove_file(&meta_path).await?;
        }

        tracing::debug!(key = %storage_key, "Local storage delete successful");

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.signed_url(SignedMethod::Get, key, "", expires_in)
    }

    async fn presigned_put_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.signed_url(SignedMethod::Put, key, content_type, expires_in)
    }

    async fn health_check(&self) -> StorageResult<()> {
        if fs::try_exists(&self.base_path).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(StorageError::BackendError(format!(
                "Storage directory {} is missing",
                self.base_path.display()
            )))
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BASE_URL: &str = "http://localhost:4000/api/v0/storage";

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(
            dir,
            BASE_URL.to_string(),
            UrlSigner::new("0123456789abcdef0123456789abcdef"),
        )
        .await
        .unwrap()
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{}=", name)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_put_get() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("temp/abc/photo.jpg", Bytes::from_static(b"test data"), "image/jpeg")
            .await
            .unwrap();

        let object = storage.get_object("temp/abc/photo.jpg").await.unwrap();
        assert_eq!(&object.data[..], b"test data");
        assert_eq!(object.metadata.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(object.metadata.content_disposition, None);
    }

    #[tokio::test]
    async fn test_put_attachment_records_disposition() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put_attachment(
                "archives/abc/snapsize-20260314-120000.zip",
                Bytes::from_static(b"PK"),
                "application/zip",
                "snapsize-20260314-120000.zip",
            )
            .await
            .unwrap();

        let object = storage
            .get_object("archives/abc/snapsize-20260314-120000.zip")
            .await
            .unwrap();
        assert_eq!(
            object.metadata.content_disposition.as_deref(),
            Some("attachment; filename=\"snapsize-20260314-120000.zip\"")
        );
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .presigned_put_url("temp/../x", "image/jpeg", Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("temp/abc/a.png", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();
        assert!(storage.exists("temp/abc/a.png").await.unwrap());

        storage.delete("temp/abc/a.png").await.unwrap();
        assert!(!storage.exists("temp/abc/a.png").await.unwrap());
        assert!(storage.delete("temp/abc/a.png").await.is_ok());
        assert!(matches!(
            storage.get("temp/abc/a.png").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_presigned_put_url_round_trip() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let url = storage
            .presigned_put_url("temp/abc/my photo.jpg", "image/jpeg", Duration::from_secs(900))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:4000/api/v0/storage/temp/abc/my%20photo.jpg?"));
        assert_eq!(query_param(&url, "method"), "PUT");

        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");

        assert!(storage
            .verify_transfer(
                SignedMethod::Put,
                "temp/abc/my photo.jpg",
                expires,
                "image/jpeg",
                signature
            )
            .is_ok());
        assert!(storage
            .verify_transfer(
                SignedMethod::Put,
                "temp/abc/my photo.jpg",
                expires,
                "image/png",
                signature
            )
            .is_err());
        assert!(storage
            .verify_transfer(
                SignedMethod::Get,
                "temp/abc/my photo.jpg",
                expires,
                "",
                signature
            )
            .is_err());
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        assert!(storage.health_check().await.is_ok());
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }
}
