//! In-memory implementation of both persistence contracts.
//!
//! Variants are removed together with their media, mirroring the `ON DELETE CASCADE` of the
//! Postgres schema. Failure switches let tests reach the compensation paths of the core.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medialife_core::models::{
    ListQuery, Media, MediaVariant, ProcessingStatus, SortField, SortOrder, VariantType,
};
use medialife_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{MediaStore, VariantStore};

#[derive(Default)]
struct State {
    media: HashMap<Uuid, Media>,
    /// Insertion order doubles as the tie-breaker for equal `created_at`.
    variants: Vec<MediaVariant>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    status_history: RwLock<Vec<(Uuid, ProcessingStatus)>>,
    failing_statuses: RwLock<Vec<ProcessingStatus>>,
    fail_create_media: AtomicBool,
    fail_update_media: AtomicBool,
    fail_create_variant: AtomicBool,
    create_media_delay_ms: AtomicU64,
    list_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create_media(&self, fail: bool) {
        self.fail_create_media.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update_media(&self, fail: bool) {
        self.fail_update_media.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create_variant(&self, fail: bool) {
        self.fail_create_variant.store(fail, Ordering::SeqCst);
    }

    /// Make transitions into `status` fail.
    pub async fn fail_status_update(&self, status: ProcessingStatus) {
        self.failing_statuses.write().await.push(status);
    }

    /// Delay every `create_media` call, so a caller can be cancelled mid-commit.
    pub fn delay_create_media(&self, delay: Duration) {
        self.create_media_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of `list_media` calls that reached the store.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Every status a record has been written with, in order (creation included).
    pub async fn status_history(&self, id: Uuid) -> Vec<ProcessingStatus> {
        self.status_history
            .read()
            .await
            .iter()
            .filter(|(media_id, _)| *media_id == id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub async fn media_count(&self) -> usize {
        self.state.read().await.media.len()
    }

    pub async fn variant_count(&self) -> usize {
        self.state.read().await.variants.len()
    }

    /// Variants whose parent no longer exists. Always empty unless cascading is broken.
    pub async fn orphaned_variants(&self) -> Vec<MediaVariant> {
        let state = self.state.read().await;
        state
            .variants
            .iter()
            .filter(|v| !state.media.contains_key(&v.media_id))
            .cloned()
            .collect()
    }

    fn compare(a: &Media, b: &Media, field: SortField) -> CmpOrdering {
        let primary = match field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Size => a.size.cmp(&b.size),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

fn injected(what: &str) -> AppError {
    AppError::Persistence(format!("injected {} failure", what))
}

#[async_trait]
impl MediaStore for InMemoryStore {
    async fn create_media(&self, media: &Media) -> Result<Media, AppError> {
        let delay = self.create_media_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_create_media.load(Ordering::SeqCst) {
            return Err(injected("create_media"));
        }

        let mut state = self.state.write().await;
        if state.media.contains_key(&media.id) {
            return Err(AppError::Persistence(format!(
                "duplicate media id {}",
                media.id
            )));
        }
        state.media.insert(media.id, media.clone());
        self.status_history
            .write()
            .await
            .push((media.id, media.processing_status));
        Ok(media.clone())
    }

    async fn get_media(&self, id: Uuid) -> Result<Option<Media>, AppError> {
        Ok(self.state.read().await.media.get(&id).cloned())
    }

    async fn list_media(&self, query: &ListQuery) -> Result<(Vec<Media>, i64), AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;

        let mut matching: Vec<&Media> = state.media.values().filter(|m| query.matches(m)).collect();
        matching.sort_by(|a, b| {
            let ord = Self::compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn update_media(&self, media: &Media) -> Result<Media, AppError> {
        if self.fail_update_media.load(Ordering::SeqCst) {
            return Err(injected("update_media"));
        }
        let mut state = self.state.write().await;
        let existing = state
            .media
            .get_mut(&media.id)
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", media.id)))?;
        existing.name = media.name.clone();
        existing.metadata = media.metadata.clone();
        existing.updated_at = media.updated_at;
        Ok(existing.clone())
    }

    async fn update_processing_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Media, AppError> {
        if self.failing_statuses.read().await.contains(&status) {
            return Err(injected("status update"));
        }
        let mut state = self.state.write().await;
        let existing = state
            .media
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;
        existing.processing_status = status;
        existing.updated_at = updated_at;
        self.status_history.write().await.push((id, status));
        Ok(existing.clone())
    }

    async fn delete_media(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let removed = state.media.remove(&id).is_some();
        if removed {
            state.variants.retain(|v| v.media_id != id);
        }
        Ok(removed)
    }

    async fn list_pending_processing(
        &self,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Media>, AppError> {
        let state = self.state.read().await;
        let mut pending: Vec<&Media> = state
            .media
            .values()
            .filter(|m| match m.processing_status {
                ProcessingStatus::Pending => true,
                ProcessingStatus::Processing => m.updated_at < stale_before,
                _ => false,
            })
            .collect();
        pending.sort_by(|a, b| Self::compare(a, b, SortField::CreatedAt));
        Ok(pending
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VariantStore for InMemoryStore {
    async fn create_variant(
        &self,
        variant: &MediaVariant,
    ) -> Result<Option<MediaVariant>, AppError> {
        if self.fail_create_variant.load(Ordering::SeqCst) {
            return Err(injected("create_variant"));
        }
        let mut state = self.state.write().await;
        if !state.media.contains_key(&variant.media_id) {
            return Err(AppError::NotFound(format!(
                "Media {} not found",
                variant.media_id
            )));
        }
        let slot_taken = state.variants.iter().any(|v| {
            v.media_id == variant.media_id
                && v.variant_type == variant.variant_type
                && v.size == variant.size
        });
        if slot_taken {
            return Ok(None);
        }
        state.variants.push(variant.clone());
        Ok(Some(variant.clone()))
    }

    async fn list_variants_by_media(&self, media_id: Uuid) -> Result<Vec<MediaVariant>, AppError> {
        let state = self.state.read().await;
        let mut variants: Vec<MediaVariant> = state
            .variants
            .iter()
            .filter(|v| v.media_id == media_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        variants.sort_by_key(|v| v.created_at);
        Ok(variants)
    }

    async fn get_variant(&self, id: Uuid) -> Result<Option<MediaVariant>, AppError> {
        let state = self.state.read().await;
        Ok(state.variants.iter().find(|v| v.id == id).cloned())
    }

    async fn get_variant_by_media_type_size(
        &self,
        media_id: Uuid,
        variant_type: VariantType,
        size: &str,
    ) -> Result<Option<MediaVariant>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .variants
            .iter()
            .find(|v| v.media_id == media_id && v.is_slot(variant_type, size))
            .cloned())
    }

    async fn delete_variant(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let before = state.variants.len();
        state.variants.retain(|v| v.id != id);
        Ok(state.variants.len() < before)
    }

    async fn delete_variants_by_media(&self, media_id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let before = state.variants.len();
        state.variants.retain(|v| v.media_id != media_id);
        Ok((before - state.variants.len()) as u64)
    }
}
