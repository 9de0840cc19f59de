//! Shared key layout for storage backends.
//!
//! - Temporary uploads: `temp/{batch_id}/{file_name}`
//! - Finished archives: `archives/{batch_id}/{file_name}`
//!
//! Keys never contain `..`, a leading `/`, backslashes or empty segments.

use crate::{StorageError, StorageResult};

pub const TEMP_PREFIX: &str = "temp";
pub const ARCHIVE_PREFIX: &str = "archives";

/// Key of one source upload inside a batch's temporary namespace.
pub fn temp_key(batch_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", TEMP_PREFIX, batch_id, file_name)
}

/// Key of a batch's finished archive.
pub fn archive_key(batch_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", ARCHIVE_PREFIX, batch_id, file_name)
}

/// Whether `key` belongs to the temporary namespace of `batch_id`.
pub fn is_temp_key_of(key: &str, batch_id: &str) -> bool {
    key.strip_prefix(TEMP_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .and_then(|rest| rest.strip_prefix(batch_id))
        .map(|rest| rest.starts_with('/') && rest.len() > 1)
        .unwrap_or(false)
}

pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| {
            segment.is_empty() || segment == "." || segment == ".." || segment.starts_with('.')
        })
        || key.chars().any(|c| c.is_control())
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Percent-encode each path segment of a key for use in a URL path.
pub fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Loggable form of a capability URL: the query string (signature) is dropped.
pub fn redact_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}
