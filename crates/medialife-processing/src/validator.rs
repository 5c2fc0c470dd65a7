use medialife_core::AppError;

/// Validation failures for incoming uploads
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Content type is required")]
    MissingContentType,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Uploader identity is required")]
    MissingCreator,

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { size, max } => AppError::FileTooLarge { size, max },
            ValidationError::InvalidContentType { content_type, .. } => {
                AppError::UnsupportedFormat(content_type)
            }
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Lowercased MIME essence without parameters: `Image/PNG; charset=x` -> `image/png`.
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Upload validator
///
/// Checks run before any side effect, so a rejected upload leaves nothing behind.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: u64,
    allowed_content_types: Vec<String>,
}

impl UploadValidator {
    pub fn new(max_file_size: u64, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .iter()
                .map(|ct| normalize_mime(ct))
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn validate_file_name(&self, file_name: &str) -> Result<(), ValidationError> {
        if file_name.trim().is_empty() {
            return Err(ValidationError::InvalidFilename(
                "file name cannot be empty".to_string(),
            ));
        }
        if file_name.contains('\0') {
            return Err(ValidationError::InvalidFilename(
                "file name contains a NUL byte".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_creator(&self, created_by: &str) -> Result<(), ValidationError> {
        if created_by.trim().is_empty() {
            return Err(ValidationError::MissingCreator);
        }
        Ok(())
    }

    /// Returns the normalized content type when it is on the allow-list.
    pub fn validate_content_type(&self, content_type: &str) -> Result<String, ValidationError> {
        let normalized = normalize_mime(content_type);
        if normalized.is_empty() {
            return Err(ValidationError::MissingContentType);
        }

        if !self.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(normalized)
    }

    /// Complete payloads must be non-empty and within the limit.
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        self.check_running_size(size)
    }

    /// Limit check for a stream that is still being received.
    pub fn check_running_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Everything a batch upload needs before touching storage. Returns the normalized
    /// content type.
    pub fn validate_batch(
        &self,
        file_name: &str,
        content_type: &str,
        created_by: &str,
        size: u64,
    ) -> Result<String, ValidationError> {
        self.validate_file_name(file_name)?;
        self.validate_creator(created_by)?;
        let content_type = self.validate_content_type(content_type)?;
        self.validate_file_size(size)?;
        Ok(content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> UploadValidator {
        UploadValidator::new(
            1024,
            vec!["image/png".to_string(), "IMAGE/JPEG".to_string()],
        )
    }

    #[test]
    fn test_normalize_mime() {
        assert_eq!(normalize_mime("Image/PNG; charset=binary"), "image/png");
        assert_eq!(normalize_mime("  "), "");
    }

    #[test]
    fn test_validate_batch_accepts_allowed_upload() {
        let ct = validator()
            .validate_batch("a.png", "image/PNG", "u1", 3)
            .unwrap();
        assert_eq!(ct, "image/png");
        assert!(validator().validate_content_type("image/jpeg").is_ok());
    }

    #[test]
    fn test_validate_batch_rejections_map_to_taxonomy() {
        let v = validator();

        let err: AppError = v.validate_batch("", "image/png", "u1", 3).unwrap_err().into();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err: AppError = v.validate_batch("a.png", "", "u1", 3).unwrap_err().into();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err: AppError = v
            .validate_batch("a.pdf", "application/pdf", "u1", 3)
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));

        let err: AppError = v.validate_batch("a.png", "image/png", "u1", 0).unwrap_err().into();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err: AppError = v
            .validate_batch("a.png", "image/png", "u1", 2048)
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            AppError::FileTooLarge {
                size: 2048,
                max: 1024
            }
        ));

        let err: AppError = v.validate_batch("a.png", "image/png", " ", 3).unwrap_err().into();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_running_size_allows_zero() {
        assert!(validator().check_running_size(0).is_ok());
        assert!(validator().check_running_size(1025).is_err());
    }
}
