//! Read, update and delete surface for media records.

use std::sync::Arc;

use chrono::Utc;
use medialife_core::models::{CleanupPayload, JobKind, ListFilters, Media, MediaPage, MediaPatch};
use medialife_core::{ensure_owner, AppError};
use medialife_db::MediaStore;
use medialife_storage::BlobStore;
use medialife_worker::TaskQueue;
use uuid::Uuid;

use crate::variants::VariantManager;

/// Parse a caller-supplied media or variant id. Blank input is rejected before any lookup.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("Id cannot be empty".to_string()));
    }
    Uuid::parse_str(trimmed)
        .map_err(|e| AppError::InvalidInput(format!("Invalid id '{}': {}", trimmed, e)))
}

pub struct MediaCatalog {
    media_store: Arc<dyn MediaStore>,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn TaskQueue>,
    variants: VariantManager,
}

impl MediaCatalog {
    pub fn new(
        media_store: Arc<dyn MediaStore>,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn TaskQueue>,
        variants: VariantManager,
    ) -> Self {
        Self {
            media_store,
            blobs,
            queue,
            variants,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Media, AppError> {
        self.media_store
            .get_media(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))
    }

    /// Filters are normalized first; a bad sort key never reaches the store.
    #[tracing::instrument(skip(self, filters))]
    pub async fn list(&self, filters: &ListFilters) -> Result<MediaPage, AppError> {
        let query = filters.normalize()?;
        let (items, total) = self.media_store.list_media(&query).await?;

        tracing::debug!(
            returned = items.len(),
            total = total,
            limit = query.limit,
            offset = query.offset,
            "Media listed"
        );

        Ok(MediaPage {
            items,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    #[tracing::instrument(skip(self, patch), fields(media.id = %id, actor = %actor))]
    pub async fn update(&self, id: Uuid, actor: &str, patch: MediaPatch) -> Result<Media, AppError> {
        patch.validate()?;

        let mut media = self.get(id).await?;
        ensure_owner(&media, actor)?;

        patch.apply(&mut media, Utc::now());
        let updated = self.media_store.update_media(&media).await?;

        tracing::info!(media_id = %id, "Media updated");
        Ok(updated)
    }

    /// Storage cleanup is best-effort; the row and its variants are always removed.
    #[tracing::instrument(skip(self), fields(media.id = %id, actor = %actor))]
    pub async fn delete(&self, id: Uuid, actor: &str) -> Result<bool, AppError> {
        let media = self.get(id).await?;
        ensure_owner(&media, actor)?;

        let variants = self.variants.list_by_media(id).await?;

        if let Err(e) = self.blobs.delete(&media.storage_key).await {
            tracing::warn!(
                error = %e,
                media_id = %id,
                storage_key = %media.storage_key,
                "Failed to delete media blob, scheduling cleanup"
            );
            self.schedule_cleanup(&media.storage_key).await;
        }

        for variant in &variants {
            self.variants.delete_blob(variant).await;
        }

        let deleted = self.media_store.delete_media(id).await?;
        if !deleted {
            return Err(AppError::NotFound(format!("Media {} not found", id)));
        }

        tracing::info!(
            media_id = %id,
            variants_removed = variants.len(),
            "Media deleted"
        );
        Ok(true)
    }

    async fn schedule_cleanup(&self, storage_key: &str) {
        let payload = CleanupPayload {
            storage_key: storage_key.to_string(),
        };
        let result = match serde_json::to_value(payload) {
            Ok(payload) => self.queue.enqueue(JobKind::Cleanup, payload).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, storage_key = %storage_key, "Failed to enqueue blob cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{variant, Harness};
    use medialife_core::models::{MediaType, ProcessingStatus};
    use std::collections::HashMap;

    #[test]
    fn parse_id_rejects_blank_and_garbage() {
        assert!(matches!(parse_id("  "), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_id("not-a-uuid"), Err(AppError::InvalidInput(_))));
        let id = Uuid::from_u128(5);
        assert_eq!(parse_id(&format!(" {} ", id)).unwrap(), id);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let h = Harness::new();
        let err = h.catalog().get(Uuid::from_u128(9)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_normalizes_pagination() {
        let h = Harness::new();
        for _ in 0..3 {
            h.seed_media("u1").await;
        }
        let catalog = h.catalog();

        let page = catalog
            .list(&ListFilters {
                limit: 0,
                offset: -5,
                ..ListFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(page.limit, 20);
        assert_eq!(page.offset, 0);
        assert_eq!(page.total, 3);

        let page = catalog
            .list(&ListFilters {
                limit: 500,
                ..ListFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(page.limit, 100);

        let page = catalog
            .list(&ListFilters {
                limit: 2,
                offset: 2,
                ..ListFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn list_filters_combine() {
        let h = Harness::new();
        h.seed_media("u1").await;
        h.seed_media("u2").await;

        let page = h
            .catalog()
            .list(&ListFilters {
                created_by: Some("u2".to_string()),
                media_type: Some(MediaType::Image),
                mime_type: Some("image/png".to_string()),
                ..ListFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].created_by, "u2");
    }

    #[tokio::test]
    async fn unknown_sort_key_performs_no_query() {
        let h = Harness::new();
        let err = h
            .catalog()
            .list(&ListFilters {
                sort_by: "dropdatabase".to_string(),
                ..ListFilters::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = h
            .catalog()
            .list(&ListFilters {
                sort_order: "sideways".to_string(),
                ..ListFilters::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(h.store.list_calls(), 0);
    }

    #[tokio::test]
    async fn update_merges_metadata_and_removes_empty_values() {
        let h = Harness::new();
        let media = h.seed_media("u1").await;
        let catalog = h.catalog();

        let updated = catalog
            .update(
                media.id,
                "u1",
                MediaPatch {
                    name: None,
                    metadata: Some(HashMap::from([("tag".to_string(), String::new())])),
                },
            )
            .await
            .unwrap();
        assert!(!updated.metadata.contains_key("tag"));
        assert_eq!(updated.metadata.get("album").map(String::as_str), Some("summer"));

        let updated = catalog
            .update(
                media.id,
                "u1",
                MediaPatch {
                    name: Some("renamed.png".to_string()),
                    metadata: Some(HashMap::from([("tag".to_string(), "bar".to_string())])),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "renamed.png");
        assert_eq!(updated.metadata.get("tag").map(String::as_str), Some("bar"));
        assert_eq!(updated.metadata.get("album").map(String::as_str), Some("summer"));
        assert!(updated.updated_at >= media.updated_at);
    }

    #[tokio::test]
    async fn update_rejects_invalid_patch_and_foreign_actor() {
        let h = Harness::new();
        let media = h.seed_media("u1").await;
        let catalog = h.catalog();

        let err = catalog
            .update(
                media.id,
                "u1",
                MediaPatch {
                    name: Some("  ".to_string()),
                    metadata: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = catalog
            .update(
                media.id,
                "u2",
                MediaPatch {
                    name: Some("stolen.png".to_string()),
                    metadata: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let stored = catalog.get(media.id).await.unwrap();
        assert_eq!(stored, media);
    }

    #[tokio::test]
    async fn delete_by_other_identity_changes_nothing() {
        let h = Harness::new();
        let media = h.seed_uploaded("u1", "image/png", b"abc").await;

        let err = h.catalog().delete(media.id, "u2").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(h.blobs.contains(&media.storage_key).await);
        assert!(h.catalog().get(media.id).await.is_ok());
    }

    #[tokio::test]
    async fn delete_cascades_to_variants_and_blobs() {
        let h = Harness::new();
        let media = h.seed_uploaded("u1", "image/png", b"abc").await;
        let v = variant(Uuid::from_u128(900), media.id, "small", 0);
        h.blobs
            .put(&v.storage_key, "image/jpeg", bytes::Bytes::from_static(b"j"))
            .await
            .unwrap();
        h.variants().create(&v).await.unwrap();

        assert!(h.catalog().delete(media.id, "u1").await.unwrap());

        let err = h.catalog().get(media.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = h.variants().list_by_media(media.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.store.variant_count().await, 0);
        assert!(h.store.orphaned_variants().await.is_empty());
        assert!(h.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn blob_delete_failure_schedules_cleanup_and_still_deletes_row() {
        let h = Harness::new();
        let media = h.seed_uploaded("u1", "image/png", b"abc").await;
        h.blobs.fail_deletes(true);

        assert!(h.catalog().delete(media.id, "u1").await.unwrap());
        assert!(h.catalog().get(media.id).await.is_err());

        let cleanups = h.queue.tasks_of(JobKind::Cleanup).await;
        assert_eq!(cleanups.len(), 1);
        let payload: CleanupPayload = cleanups[0].payload_as().unwrap();
        assert_eq!(payload.storage_key, media.storage_key);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let h = Harness::new();
        let err = h
            .catalog()
            .delete(Uuid::from_u128(31), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(
            h.store.status_history(Uuid::from_u128(31)).await,
            Vec::<ProcessingStatus>::new()
        );
    }
}
