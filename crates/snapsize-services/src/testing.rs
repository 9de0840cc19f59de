//! In-memory storage double for service tests

use async_trait::async_trait;
use bytes::Bytes;
use snapsize_storage::{Storage, StorageBackend, StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct MemoryStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    dispositions: Mutex<HashMap<String, String>>,
    refuse_presign: Mutex<HashSet<String>>,
    refuse_delete: Mutex<HashSet<String>>,
    refuse_put: Mutex<bool>,
}

impl MemoryStorage {
    pub(crate) fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (Bytes::from(data), "image/png".to_string()));
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn object(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub(crate) fn disposition(&self, key: &str) -> Option<String> {
        self.dispositions.lock().unwrap().get(key).cloned()
    }

    /// Refuse to sign any key ending in `suffix`
    pub(crate) fn refuse_presign_for(&self, suffix: &str) {
        self.refuse_presign.lock().unwrap().insert(suffix.to_string());
    }

    pub(crate) fn refuse_delete_for(&self, key: &str) {
        self.refuse_delete.lock().unwrap().insert(key.to_string());
    }

    pub(crate) fn refuse_puts(&self) {
        *self.refuse_put.lock().unwrap() = true;
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        if *self.refuse_put.lock().unwrap() {
            return Err(StorageError::UploadFailed("bucket unavailable".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn put_attachment(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        file_name: &str,
    ) -> StorageResult<()> {
        self.put(key, data, content_type).await?;
        self.dispositions
            .lock()
            .unwrap()
            .insert(key.to_string(), file_name.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.refuse_delete.lock().unwrap().contains(key) {
            return Err(StorageError::DeleteFailed("access denied".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!(
            "memory://{}?method=GET&ttl={}&signature=test",
            key,
            expires_in.as_secs()
        ))
    }

    async fn presigned_put_url(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        if self
            .refuse_presign
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| key.ends_with(suffix.as_str()))
        {
            return Err(StorageError::SigningFailed("credentials expired".to_string()));
        }
        Ok(format!(
            "memory://{}?method=PUT&ttl={}&signature=test",
            key,
            expires_in.as_secs()
        ))
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
