//! Variant rows and their blobs
//!
//! Every variant belongs to exactly one media. Each (media, type, size) slot holds at most one
//! variant; deleting a variant removes its row first and its blob on a best-effort basis.

use std::sync::Arc;

use medialife_core::models::{MediaVariant, VariantType};
use medialife_core::AppError;
use medialife_db::{MediaStore, VariantStore};
use medialife_storage::BlobStore;
use uuid::Uuid;

/// Creates, lists and deletes variant rows tied to a parent media.
#[derive(Clone)]
pub struct VariantManager {
    media_store: Arc<dyn MediaStore>,
    variant_store: Arc<dyn VariantStore>,
    blobs: Arc<dyn BlobStore>,
}

impl VariantManager {
    pub fn new(
        media_store: Arc<dyn MediaStore>,
        variant_store: Arc<dyn VariantStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            media_store,
            variant_store,
            blobs,
        }
    }

    /// Fails with `NotFound` when the parent media does not exist. Returns `None` when another
    /// run already filled the slot.
    pub async fn create(&self, variant: &MediaVariant) -> Result<Option<MediaVariant>, AppError> {
        let created = self.variant_store.create_variant(variant).await?;
        match &created {
            Some(created) => tracing::debug!(
                variant_id = %created.id,
                media_id = %created.media_id,
                variant_type = %created.variant_type,
                size = %created.size,
                "Variant recorded"
            ),
            None => tracing::debug!(
                variant_id = %variant.id,
                media_id = %variant.media_id,
                variant_type = %variant.variant_type,
                size = %variant.size,
                "Variant slot already filled"
            ),
        }
        Ok(created)
    }

    /// Variants of a media, oldest first. A missing media is `NotFound`, not an empty list.
    pub async fn list_by_media(&self, media_id: Uuid) -> Result<Vec<MediaVariant>, AppError> {
        if self.media_store.get_media(media_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Media {} not found", media_id)));
        }
        self.variant_store.list_variants_by_media(media_id).await
    }

    pub async fn find(
        &self,
        media_id: Uuid,
        variant_type: VariantType,
        size: &str,
    ) -> Result<Option<MediaVariant>, AppError> {
        self.variant_store
            .get_variant_by_media_type_size(media_id, variant_type, size)
            .await
    }

    /// Delete one variant row, then its blob (best-effort).
    pub async fn delete(&self, variant_id: Uuid) -> Result<bool, AppError> {
        let variant = self
            .variant_store
            .get_variant(variant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Variant {} not found", variant_id)))?;

        let deleted = self.variant_store.delete_variant(variant_id).await?;
        if !deleted {
            return Err(AppError::NotFound(format!("Variant {} not found", variant_id)));
        }

        self.delete_blob(&variant).await;
        Ok(true)
    }

    /// Delete every variant of a media and their blobs. Returns the number of rows removed.
    pub async fn delete_by_media(&self, media_id: Uuid) -> Result<u64, AppError> {
        let variants = self.variant_store.list_variants_by_media(media_id).await?;
        let removed = self.variant_store.delete_variants_by_media(media_id).await?;
        for variant in &variants {
            self.delete_blob(variant).await;
        }
        Ok(removed)
    }

    pub(crate) async fn delete_blob(&self, variant: &MediaVariant) {
        if let Err(e) = self.blobs.delete(&variant.storage_key).await {
            tracing::warn!(
                error = %e,
                variant_id = %variant.id,
                storage_key = %variant.storage_key,
                "Failed to delete variant blob"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{variant, Harness};
    use bytes::Bytes;

    #[tokio::test]
    async fn list_by_media_requires_parent() {
        let h = Harness::new();
        let err = h
            .variants()
            .list_by_media(Uuid::from_u128(77))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_rejects_orphans_and_lists_in_creation_order() {
        let h = Harness::new();
        let media = h.seed_media("u1").await;
        let manager = h.variants();

        let err = manager
            .create(&variant(Uuid::from_u128(500), Uuid::from_u128(999), "small", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        manager
            .create(&variant(Uuid::from_u128(501), media.id, "large", 2))
            .await
            .unwrap();
        manager
            .create(&variant(Uuid::from_u128(502), media.id, "small", 1))
            .await
            .unwrap();

        let sizes: Vec<String> = manager
            .list_by_media(media.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.size)
            .collect();
        assert_eq!(sizes, vec!["small", "large"]);

        let found = manager
            .find(media.id, VariantType::Thumbnail, "large")
            .await
            .unwrap();
        assert_eq!(found.map(|v| v.id), Some(Uuid::from_u128(501)));
    }

    #[tokio::test]
    async fn create_into_filled_slot_returns_none() {
        let h = Harness::new();
        let media = h.seed_media("u1").await;
        let manager = h.variants();

        let first = manager
            .create(&variant(Uuid::from_u128(510), media.id, "small", 0))
            .await
            .unwrap();
        assert!(first.is_some());
        let second = manager
            .create(&variant(Uuid::from_u128(511), media.id, "small", 1))
            .await
            .unwrap();
        assert!(second.is_none());

        let ids: Vec<Uuid> = manager
            .list_by_media(media.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![Uuid::from_u128(510)]);
    }

    #[tokio::test]
    async fn delete_removes_row_and_blob() {
        let h = Harness::new();
        let media = h.seed_media("u1").await;
        let manager = h.variants();
        let v = variant(Uuid::from_u128(600), media.id, "small", 0);
        h.blobs
            .put(&v.storage_key, "image/jpeg", Bytes::from_static(b"j"))
            .await
            .unwrap();
        manager.create(&v).await.unwrap();

        assert!(manager.delete(v.id).await.unwrap());
        assert!(!h.blobs.contains(&v.storage_key).await);

        let err = manager.delete(v.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_by_media_counts_rows() {
        let h = Harness::new();
        let media = h.seed_media("u1").await;
        let manager = h.variants();
        for (n, size) in ["small", "medium"].iter().enumerate() {
            manager
                .create(&variant(Uuid::from_u128(700 + n as u128), media.id, size, 0))
                .await
                .unwrap();
        }

        assert_eq!(manager.delete_by_media(media.id).await.unwrap(), 2);
        assert!(manager.list_by_media(media.id).await.unwrap().is_empty());
    }
}
