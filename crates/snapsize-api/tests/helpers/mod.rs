//! Test helpers: build AppState and router for integration tests.
//!
//! Every test app gets its own temporary local storage root and in-memory quota
//! ledger, so tests run in parallel without shared state.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use snapsize_api::constants::{ACCOUNT_ID_HEADER, API_PREFIX};
use snapsize_api::setup::{routes, services};
use snapsize_api::state::AppState;
use snapsize_core::{AppConfig, Config, LogFormat, StorageBackend};
use snapsize_services::InMemoryQuotaLedger;
use snapsize_storage::{LocalStorage, StorageHandle, UrlSigner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_SERVICE_KEY: &str = "test-service-key-0123456789abcdef";
const TEST_SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";
const TEST_BASE_URL: &str = "http://localhost/api/v0/storage";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Filesystem root of the local storage backend
    pub fn storage_root(&self) -> &Path {
        self._temp_dir.path()
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.storage_root().join(key)
    }

    /// Declare files and receive upload slots.
    pub async fn create_batch(
        &self,
        account: Uuid,
        files: &[(&str, impl AsRef<[u8]>)],
    ) -> TestResponse {
        let files: Vec<Value> = files
            .iter()
            .map(|(name, data)| json!({ "name": name, "size": data.as_ref().len(), "type": "image/png" }))
            .collect();
        self.server
            .post(&api_path("/batches"))
            .add_header(ACCOUNT_ID_HEADER, account.to_string())
            .json(&json!({ "files": files }))
            .await
    }

    /// Create a batch and upload every file through its slot. Returns the batch JSON.
    pub async fn uploaded_batch(
        &self,
        account: Uuid,
        files: &[(&str, impl AsRef<[u8]>)],
    ) -> Value {
        let response = self.create_batch(account, files).await;
        assert_eq!(response.status_code(), 201, "{}", response.text());
        let batch: Value = response.json();

        for (slot, (_, data)) in batch["slots"].as_array().unwrap().iter().zip(files) {
            let upload = self.upload(slot, data.as_ref().to_vec(), "image/png").await;
            assert_eq!(upload.status_code(), 200, "{}", upload.text());
        }
        batch
    }

    /// PUT bytes through a slot's signed URL.
    pub async fn upload(&self, slot: &Value, data: Vec<u8>, content_type: &str) -> TestResponse {
        let (path, params) = signed_path(slot["upload_url"].as_str().unwrap());
        let mut request = self
            .server
            .put(&path)
            .bytes(data.into())
            .content_type(content_type);
        for (key, value) in params {
            request = request.add_query_param(&key, value);
        }
        request.await
    }

    /// GET through a signed URL.
    pub async fn download(&self, url: &str) -> TestResponse {
        let (path, params) = signed_path(url);
        let mut request = self.server.get(&path);
        for (key, value) in params {
            request = request.add_query_param(&key, value);
        }
        request.await
    }

    /// Process every slot of `batch` with `options`, reporting each upload's stored size.
    pub async fn process(&self, account: Uuid, batch: &Value, options: Value) -> TestResponse {
        let files: Vec<Value> = batch["slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|slot| {
                let key = slot["key"].as_str().unwrap();
                let size = std::fs::metadata(self.object_path(key))
                    .map(|meta| meta.len())
                    .unwrap_or(0);
                json!({
                    "key": key,
                    "original_name": slot["file_name"],
                    "size": size,
                })
            })
            .collect();
        let batch_id = batch["batch_id"].as_str().unwrap();
        self.server
            .post(&api_path(&format!("/batches/{}/process", batch_id)))
            .add_header(ACCOUNT_ID_HEADER, account.to_string())
            .json(&json!({ "files": files, "options": options }))
            .await
    }

    pub async fn quota(&self, account: Uuid) -> Value {
        self.server
            .get(&api_path("/quota"))
            .add_header(ACCOUNT_ID_HEADER, account.to_string())
            .await
            .json()
    }
}

/// Split a signed URL into the API path and its query parameters.
pub fn signed_path(url: &str) -> (String, Vec<(String, String)>) {
    let start = url.find(API_PREFIX).expect("signed URL points at the API");
    let (path, query) = url[start..]
        .split_once('?')
        .expect("signed URL carries a query");
    let params = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (path.to_string(), params)
}

/// Setup test app with local storage and an in-memory ledger.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(temp_dir.path());

    let local = Arc::new(
        LocalStorage::new(
            temp_dir.path().to_path_buf(),
            TEST_BASE_URL.to_string(),
            UrlSigner::new(TEST_SIGNING_SECRET),
        )
        .await
        .expect("Failed to create local storage"),
    );
    let storage = StorageHandle {
        storage: local.clone(),
        local: Some(local),
    };

    let state = services::initialize_services(
        &config,
        Arc::new(InMemoryQuotaLedger::new()),
        storage,
    );
    let app = routes::setup_routes(&config, state.clone())
        .await
        .expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

fn create_test_config(storage_path: &Path) -> Config {
    Config(Box::new(AppConfig {
        environment: "test".to_string(),
        server_port: 4000,
        cors_origins: vec!["*".to_string()],
        database_url: None,
        db_max_connections: 5,
        db_timeout_seconds: 30,
        storage_backend: StorageBackend::Local,
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        aws_region: None,
        local_storage_path: Some(storage_path.display().to_string()),
        local_storage_base_url: Some(TEST_BASE_URL.to_string()),
        url_signing_secret: Some(TEST_SIGNING_SECRET.to_string()),
        service_api_key: Some(TEST_SERVICE_KEY.to_string()),
        processing_worker_limit: 4,
        max_image_dimension: 8000,
        upload_url_ttl_minutes: 15,
        download_url_ttl_hours: 1,
        batch_ttl_minutes: 60,
        max_request_body_mb: 64,
        log_format: LogFormat::Text,
    }))
}
