//! Persistence contracts consumed by the lifecycle core.
//!
//! Method names are distinct across the two traits so a single type (such as
//! [`crate::InMemoryStore`]) can implement both without ambiguity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medialife_core::models::{ListQuery, Media, MediaVariant, ProcessingStatus, VariantType};
use medialife_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn create_media(&self, media: &Media) -> Result<Media, AppError>;

    async fn get_media(&self, id: Uuid) -> Result<Option<Media>, AppError>;

    /// One page of matching records plus the total match count, ignoring pagination.
    async fn list_media(&self, query: &ListQuery) -> Result<(Vec<Media>, i64), AppError>;

    /// Persists `name`, `metadata` and `updated_at`. Missing rows yield `NotFound`.
    async fn update_media(&self, media: &Media) -> Result<Media, AppError>;

    async fn update_processing_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Media, AppError>;

    /// Returns whether a row was removed. Variants go with it.
    async fn delete_media(&self, id: Uuid) -> Result<bool, AppError>;

    /// `pending` records plus `processing` records last touched before `stale_before`, oldest
    /// first.
    async fn list_pending_processing(
        &self,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Media>, AppError>;
}

#[async_trait]
pub trait VariantStore: Send + Sync {
    /// Fails with `NotFound` when the parent media does not exist. Returns `None` when the
    /// media already has a variant of the same type and size.
    async fn create_variant(
        &self,
        variant: &MediaVariant,
    ) -> Result<Option<MediaVariant>, AppError>;

    /// Ordered by creation time ascending.
    async fn list_variants_by_media(&self, media_id: Uuid) -> Result<Vec<MediaVariant>, AppError>;

    async fn get_variant(&self, id: Uuid) -> Result<Option<MediaVariant>, AppError>;

    async fn get_variant_by_media_type_size(
        &self,
        media_id: Uuid,
        variant_type: VariantType,
        size: &str,
    ) -> Result<Option<MediaVariant>, AppError>;

    async fn delete_variant(&self, id: Uuid) -> Result<bool, AppError>;

    async fn delete_variants_by_media(&self, media_id: Uuid) -> Result<u64, AppError>;
}
