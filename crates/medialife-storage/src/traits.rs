//! Blob storage abstraction
//!
//! Every backend implements [`BlobStore`]. The media lifecycle core only ever talks to this trait,
//! so it can run against disk, S3 or memory without knowing which.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use medialife_core::{AppError, StorageBackend};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Blob not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Durable byte storage keyed by a caller-chosen path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous object, and return its locator.
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<String>;

    /// Fetch the object stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Remove the object stored under `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Time-limited locator for direct reads.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    fn backend_type(&self) -> StorageBackend;
}

#[cfg(test)]
mod tests {
    use super::*;
    use medialife_core::ErrorMetadata;

    #[test]
    fn test_storage_error_maps_to_taxonomy() {
        let err: AppError = StorageError::NotFound("media/x.png".to_string()).into();
        assert!(err.is_not_found());

        let err: AppError = StorageError::InvalidKey("bad".to_string()).into();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err: AppError = StorageError::UploadFailed("disk full".to_string()).into();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert_eq!(err.error_type(), "StorageFailure");
    }
}
