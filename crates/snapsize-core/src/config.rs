//! Configuration module
//!
//! Settings are read once from the environment (optionally a `.env` file) at startup.
//! [`ProcessingConfig`] is the immutable slice of it handed to the variant processor
//! and the batch pipeline.

use std::env;

use crate::models::SizeLabel;
use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const PROCESSING_WORKER_LIMIT: usize = 4;
const MAX_WORKER_LIMIT: usize = 32;
const MAX_IMAGE_DIMENSION: u32 = 8000;
const UPLOAD_URL_TTL_MINUTES: i64 = 15;
const DOWNLOAD_URL_TTL_HOURS: i64 = 1;
const BATCH_TTL_MINUTES: i64 = 60;
const MAX_REQUEST_BODY_MB: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from the environment
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, R2, ...)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub url_signing_secret: Option<String>,
    // Service-to-service auth for the billing collaborator
    pub service_api_key: Option<String>,
    // Pipeline
    pub processing_worker_limit: usize,
    pub max_image_dimension: u32,
    pub upload_url_ttl_minutes: i64,
    pub download_url_ttl_hours: i64,
    pub batch_ttl_minutes: i64,
    pub max_request_body_mb: usize,
    pub log_format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct Config(pub Box<AppConfig>);

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = AppConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    pub fn is_production(&self) -> bool {
        let environment = self.0.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn environment(&self) -> &str {
        &self.0.environment
    }

    pub fn server_port(&self) -> u16 {
        self.0.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.0.cors_origins
    }

    pub fn database_url(&self) -> Option<&str> {
        self.0.database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.0.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.0.db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.0.storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.0.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.0.s3_region.as_deref().or(self.0.aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.0.s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.0.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.0.local_storage_base_url.as_deref()
    }

    pub fn url_signing_secret(&self) -> Option<&str> {
        self.0.url_signing_secret.as_deref()
    }

    pub fn service_api_key(&self) -> Option<&str> {
        self.0.service_api_key.as_deref()
    }

    pub fn upload_url_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.0.upload_url_ttl_minutes)
    }

    pub fn download_url_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.0.download_url_ttl_hours)
    }

    pub fn batch_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.0.batch_ttl_minutes)
    }

    pub fn max_request_body_bytes(&self) -> usize {
        self.0.max_request_body_mb * 1024 * 1024
    }

    pub fn log_format(&self) -> LogFormat {
        self.0.log_format
    }

    pub fn processing(&self) -> ProcessingConfig {
        ProcessingConfig {
            max_source_dimension: self.0.max_image_dimension,
            worker_limit: self.0.processing_worker_limit,
            size_bounds: SizeBounds::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<StorageBackend>()?;

        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            environment,
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            url_signing_secret: env::var("URL_SIGNING_SECRET").ok(),
            service_api_key: env::var("SERVICE_API_KEY").ok().filter(|s| !s.is_empty()),
            processing_worker_limit: env::var("PROCESSING_WORKER_LIMIT")
                .unwrap_or_else(|_| PROCESSING_WORKER_LIMIT.to_string())
                .parse::<usize>()
                .unwrap_or(PROCESSING_WORKER_LIMIT)
                .clamp(1, MAX_WORKER_LIMIT),
            max_image_dimension: env::var("MAX_IMAGE_DIMENSION")
                .unwrap_or_else(|_| MAX_IMAGE_DIMENSION.to_string())
                .parse()
                .unwrap_or(MAX_IMAGE_DIMENSION),
            upload_url_ttl_minutes: env::var("UPLOAD_URL_TTL_MINUTES")
                .unwrap_or_else(|_| UPLOAD_URL_TTL_MINUTES.to_string())
                .parse()
                .unwrap_or(UPLOAD_URL_TTL_MINUTES),
            download_url_ttl_hours: env::var("DOWNLOAD_URL_TTL_HOURS")
                .unwrap_or_else(|_| DOWNLOAD_URL_TTL_HOURS.to_string())
                .parse()
                .unwrap_or(DOWNLOAD_URL_TTL_HOURS),
            batch_ttl_minutes: env::var("BATCH_TTL_MINUTES")
                .unwrap_or_else(|_| BATCH_TTL_MINUTES.to_string())
                .parse()
                .unwrap_or(BATCH_TTL_MINUTES),
            max_request_body_mb: env::var("MAX_REQUEST_BODY_MB")
                .unwrap_or_else(|_| MAX_REQUEST_BODY_MB.to_string())
                .parse()
                .unwrap_or(MAX_REQUEST_BODY_MB),
            log_format,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if let Some(key) = &self.service_api_key {
            if key.len() < 32 {
                return Err(anyhow::anyhow!(
                    "SERVICE_API_KEY must be at least 32 characters long"
                ));
            }
        }

        if self.upload_url_ttl_minutes <= 0
            || self.download_url_ttl_hours <= 0
            || self.batch_ttl_minutes <= 0
        {
            return Err(anyhow::anyhow!("URL and batch TTLs must be positive"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
                match &self.url_signing_secret {
                    Some(secret) if secret.len() >= 32 => {}
                    _ => {
                        return Err(anyhow::anyhow!(
                            "URL_SIGNING_SECRET must be at least 32 characters when using local storage backend"
                        ))
                    }
                }
            }
        }

        Ok(())
    }
}

/// Longest-edge bound per size label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeBounds {
    pub xs: u32,
    pub s: u32,
    pub m: u32,
    pub l: u32,
    pub xl: u32,
}

impl SizeBounds {
    pub fn bound(&self, label: SizeLabel) -> u32 {
        match label {
            SizeLabel::Xs => self.xs,
            SizeLabel::S => self.s,
            SizeLabel::M => self.m,
            SizeLabel::L => self.l,
            SizeLabel::Xl => self.xl,
        }
    }
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            xs: SizeLabel::Xs.default_bound(),
            s: SizeLabel::S.default_bound(),
            m: SizeLabel::M.default_bound(),
            l: SizeLabel::L.default_bound(),
            xl: SizeLabel::Xl.default_bound(),
        }
    }
}

/// Immutable settings for variant generation and the batch worker pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// Sources wider or taller than this are rejected before decoding pixels
    pub max_source_dimension: u32,
    /// Single concurrency limit for fetch, encode and cleanup work in a batch
    pub worker_limit: usize,
    pub size_bounds: SizeBounds,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_source_dimension: MAX_IMAGE_DIMENSION,
            worker_limit: PROCESSING_WORKER_LIMIT,
            size_bounds: SizeBounds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> AppConfig {
        AppConfig {
            environment: "development".to_string(),
            server_port: 4000,
            cors_origins: vec!["*".to_string()],
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: Some("/tmp/snapsize".to_string()),
            local_storage_base_url: Some("http://localhost:4000/api/v0/storage".to_string()),
            url_signing_secret: Some("x".repeat(32)),
            service_api_key: None,
            processing_worker_limit: PROCESSING_WORKER_LIMIT,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            upload_url_ttl_minutes: UPLOAD_URL_TTL_MINUTES,
            download_url_ttl_hours: DOWNLOAD_URL_TTL_HOURS,
            batch_ttl_minutes: BATCH_TTL_MINUTES,
            max_request_body_mb: MAX_REQUEST_BODY_MB,
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn test_local_backend_requires_signing_secret() {
        let mut config = local_config();
        assert!(config.validate().is_ok());

        config.url_signing_secret = Some("short".to_string());
        assert!(config.validate().is_err());

        config.url_signing_secret = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_backend_requires_bucket_and_region() {
        let mut config = local_config();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());

        config.s3_bucket = Some("snapsize".to_string());
        assert!(config.validate().is_err());

        config.aws_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_url_must_be_postgres() {
        let mut config = local_config();
        config.database_url = Some("mysql://localhost/db".to_string());
        assert!(config.validate().is_err());
        config.database_url = Some("postgres://localhost/snapsize".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_processing_config_from_app_config() {
        let config = Config(Box::new(local_config()));
        let processing = config.processing();
        assert_eq!(processing.max_source_dimension, 8000);
        assert_eq!(processing.worker_limit, 4);
        assert_eq!(processing.size_bounds.bound(SizeLabel::M), 1024);
        assert_eq!(config.upload_url_ttl(), chrono::Duration::minutes(15));
        assert!(!config.is_production());
    }
}
