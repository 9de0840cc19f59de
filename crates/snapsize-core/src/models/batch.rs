use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::options::SizeLabel;

/// One file the client intends to upload, as declared before upload
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct RequestedFile {
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub name: String,
    /// Declared size in bytes
    pub size: u64,
    /// Declared content type (MIME type)
    #[serde(rename = "type", alias = "content_type")]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
}

/// Time-boxed capability to upload one source file into the temporary namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct UploadSlot {
    /// Temporary object key, scoped by batch id
    pub key: String,
    pub original_file_name: String,
    pub content_type: String,
    /// Size the client declared when it was admitted; the upload may not exceed it
    pub declared_size: u64,
    /// Pre-authorized PUT URL. Treat as a secret.
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
}

/// An admitted batch awaiting processing
#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_id: String,
    pub account_id: Uuid,
    pub slots: Vec<UploadSlot>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Batch {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn slot(&self, key: &str) -> Option<&UploadSlot> {
        self.slots.iter().find(|slot| slot.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.key.as_str())
    }
}

/// A source file the client asks to process, as uploaded through a slot
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ProcessFile {
    pub key: String,
    #[serde(alias = "originalName")]
    pub original_name: String,
    pub size: u64,
}

/// One encoded derivative of a source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantResult {
    pub size_label: SizeLabel,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// All variants produced for one source file
#[derive(Debug, Clone)]
pub struct ProcessedSource {
    pub original_name: String,
    pub variants: Vec<VariantResult>,
}

impl ProcessedSource {
    pub fn largest_variant_bytes(&self) -> u64 {
        self.variants
            .iter()
            .map(|v| v.bytes.len() as u64)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ManifestEntry {
    pub path: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceMetric {
    pub original_name: String,
    pub largest_variant_bytes: u64,
}

/// What went into an archive, plus the "bytes represented" metric.
///
/// `bytes_represented` is the sum, over source files, of each file's largest single
/// variant. It is a coarse volume indicator, not a compression ratio.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ArchiveManifest {
    pub entries: Vec<ManifestEntry>,
    pub sources: Vec<SourceMetric>,
    pub bytes_represented: u64,
}

impl ArchiveManifest {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Finished batch, returned to the caller before the ledger is debited
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub archive_key: String,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub files_processed: usize,
    pub manifest: ArchiveManifest,
    pub cleanup_failures: usize,
}
