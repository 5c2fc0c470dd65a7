//! In-memory blob store.
//!
//! Used by tests and by development setups (`STORAGE_BACKEND=memory`). Failure switches let
//! tests drive the compensation paths of the lifecycle core.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::traits::{BlobStore, StorageError, StorageResult};
use crate::StorageBackend;

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    data: Bytes,
}

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
    fail_deletes: AtomicBool,
    deletes: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful deletes of existing keys.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Length of the stored object, if any.
    pub async fn size_of(&self, key: &str) -> Option<usize> {
        self.blobs.read().await.get(key).map(|b| b.data.len())
    }

    pub async fn content_type_of(&self, key: &str) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|b| b.content_type.clone())
    }

    fn url_for(key: &str) -> String {
        format!("memory://{}", key)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!(
                "injected put failure for {}",
                key
            )));
        }
        tracing::debug!(key = %key, size_bytes = data.len(), "Memory storage put");
        self.blobs.write().await.insert(
            key.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                data,
            },
        );
        Ok(Self::url_for(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::DownloadFailed(format!(
                "injected get failure for {}",
                key
            )));
        }
        self.blobs
            .read()
            .await
            .get(key)
            .map(|b| b.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!(
                "injected delete failure for {}",
                key
            )));
        }
        if self.blobs.write().await.remove(key).is_some() {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if !self.contains(key).await {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!(
            "{}?expires_in={}",
            Self::url_for(key),
            expires_in.as_secs()
        ))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.contains(key).await)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryBlobStore::new();
        let url = store
            .put("media/a.png", "image/png", Bytes::from_static(b"abc"))
            .await
            .unwrap();
        assert_eq!(url, "memory://media/a.png");
        assert_eq!(store.size_of("media/a.png").await, Some(3));
        assert_eq!(
            store.content_type_of("media/a.png").await.as_deref(),
            Some("image/png")
        );

        store.delete("media/a.png").await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.delete_count(), 1);
        assert!(matches!(
            store.get("media/a.png").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryBlobStore::new();
        store.fail_puts(true);
        assert!(store
            .put("k", "text/plain", Bytes::from_static(b"x"))
            .await
            .is_err());
        assert!(store.is_empty().await);

        store.fail_puts(false);
        store
            .put("k", "text/plain", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.fail_deletes(true);
        assert!(store.delete("k").await.is_err());
        assert!(store.contains("k").await);
    }

    #[tokio::test]
    async fn test_signed_url_requires_object() {
        let store = InMemoryBlobStore::new();
        assert!(store
            .signed_url("missing", Duration::from_secs(5))
            .await
            .is_err());
        store
            .put("k", "text/plain", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(
            store.signed_url("k", Duration::from_secs(5)).await.unwrap(),
            "memory://k?expires_in=5"
        );
    }
}
