use std::path::Path;

use snapsize_core::AppError;

/// Source content types accepted for upload slots
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Common validation errors for source files
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("Duplicate filename in batch: {0}")]
    DuplicateFilename(String),

    #[error("Empty batch")]
    EmptyBatch,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidContentType { ref content_type, .. } => {
                AppError::UnsupportedFormat {
                    file_name: String::new(),
                    detail: format!("content type {} is not accepted", content_type),
                }
            }
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Source file validator for the upload broker
pub struct MediaValidator {
    allowed_content_types: Vec<String>,
}

impl Default for MediaValidator {
    fn default() -> Self {
        Self::new(ALLOWED_CONTENT_TYPES.iter().map(|ct| ct.to_string()).collect())
    }
}

impl MediaValidator {
    pub fn new(allowed_content_types: Vec<String>) -> Self {
        Self {
            allowed_content_types,
        }
    }

    /// Validate a declared content type. Parameters such as `; charset=` are ignored.
    pub fn validate_content_type(&self, content_type: &str) -> Result<String, ValidationError> {
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        if !self.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(normalized)
    }

    /// Sanitize every name in a batch and reject duplicates after sanitization.
    pub fn validate_batch_names<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<String>, ValidationError> {
        let mut sanitized: Vec<String> = Vec::new();
        for name in names {
            let clean = sanitize_file_name(name)?;
            if sanitized.contains(&clean) {
                return Err(ValidationError::DuplicateFilename(clean));
            }
            sanitized.push(clean);
        }

        if sanitized.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        Ok(sanitized)
    }
}

/// Reduce a client-supplied name to a safe base name usable as the last key segment.
///
/// Directory components (either separator) are dropped and control characters removed.
pub fn sanitize_file_name(name: &str) -> Result<String, ValidationError> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." || cleaned.starts_with('.') {
        return Err(ValidationError::InvalidFilename(name.to_string()));
    }

    Ok(cleaned.to_string())
}

/// File name without its final extension (`photo.final.jpg` -> `photo.final`).
pub fn base_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(file_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_type() {
        let validator = MediaValidator::default();
        assert_eq!(
            validator.validate_content_type("image/JPEG").unwrap(),
            "image/jpeg"
        );
        assert_eq!(
            validator
                .validate_content_type("image/png; charset=binary")
                .unwrap(),
            "image/png"
        );
        assert!(validator.validate_content_type("image/svg+xml").is_err());
        assert!(validator.validate_content_type("").is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo.jpg").unwrap(), "photo.jpg");
        assert_eq!(sanitize_file_name("a/b/photo.jpg").unwrap(), "photo.jpg");
        assert_eq!(sanitize_file_name("C:\\x\\photo.jpg").unwrap(), "photo.jpg");
        assert_eq!(sanitize_file_name("ph\u{0}oto.jpg").unwrap(), "photo.jpg");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name(".hidden").is_err());
    }

    #[test]
    fn test_validate_batch_names_rejects_duplicates() {
        let validator = MediaValidator::default();
        let names = validator.validate_batch_names(["a.jpg", "b.jpg"]).unwrap();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);

        assert!(matches!(
            validator.validate_batch_names(["x/a.jpg", "y/a.jpg"]),
            Err(ValidationError::DuplicateFilename(_))
        ));
        assert!(matches!(
            validator.validate_batch_names(Vec::<&str>::new()),
            Err(ValidationError::EmptyBatch)
        ));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("photo.jpg"), "photo");
        assert_eq!(base_name("photo.final.png"), "photo.final");
        assert_eq!(base_name("photo"), "photo");
    }

    #[test]
    fn test_unsupported_content_type_maps_to_app_error() {
        let err: AppError = MediaValidator::default()
            .validate_content_type("text/plain")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::UnsupportedFormat { .. }));
    }
}
