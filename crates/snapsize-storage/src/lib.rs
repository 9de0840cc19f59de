//! Snapsize Storage Library
//!
//! Storage abstraction plus S3 (object_store) and local filesystem backends.
//!
//! # Storage key format
//!
//! - Temporary uploads: `temp/{batch_id}/{file_name}`
//! - Finished archives: `archives/{batch_id}/{archive_name}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod signing;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, StorageHandle};
pub use keys::redact_url;
#[cfg(feature = "storage-local")]
pub use local::{LocalStorage, ObjectMetadata, StoredObject};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use signing::{SignedMethod, UrlSigner};
pub use snapsize_core::StorageBackend;
pub use traits::{attachment_disposition, Storage, StorageError, StorageResult};
