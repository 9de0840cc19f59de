//! Snapsize Core Library
//!
//! Domain models, error types, configuration, the admission controller and the quota
//! ledger interface shared by every Snapsize crate.

pub mod admission;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod storage_types;

pub use admission::{check_category_gating, evaluate, AdmissionDecision, AdmissionRequest};
pub use config::{AppConfig, Config, LogFormat, ProcessingConfig, SizeBounds};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use ledger::QuotaLedger;
pub use storage_types::StorageBackend;
