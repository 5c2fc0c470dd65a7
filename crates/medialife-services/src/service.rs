//! Media service facade
//!
//! One entry point over ingestion, processing, the catalog and variants. Ids arrive as strings
//! from the outer layer and are parsed here. The service is also the task handler context the
//! worker dispatches `media:process` and `media:cleanup` jobs to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use medialife_core::models::{
    CleanupPayload, JobKind, ListFilters, Media, MediaPage, MediaPatch, MediaVariant,
    ProcessMediaPayload,
};
use medialife_core::{AppError, IdGenerator};
use medialife_db::{MediaStore, VariantStore};
use medialife_processing::{MediaTransform, MetadataExtractor, UploadValidator};
use medialife_storage::BlobStore;
use medialife_worker::{Task, TaskHandlerContext, TaskQueue};
use serde_json::json;

use crate::catalog::{parse_id, MediaCatalog};
use crate::ingest::{UploadChunk, UploadIngestor, UploadRequest};
use crate::orchestrator::ProcessingOrchestrator;
use crate::variants::VariantManager;

/// Collaborators a [`MediaService`] is built from.
pub struct MediaServiceDeps {
    pub media_store: Arc<dyn MediaStore>,
    pub variant_store: Arc<dyn VariantStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub transform: Arc<dyn MediaTransform>,
    pub queue: Arc<dyn TaskQueue>,
    pub ids: Arc<dyn IdGenerator>,
    pub validator: UploadValidator,
    /// Lifetime of signed URLs when the caller does not pick one.
    pub signed_url_ttl: Duration,
    /// Age after which a record still in `processing` is swept again.
    pub stale_processing_after: Duration,
}

pub struct MediaService {
    ingestor: UploadIngestor,
    orchestrator: ProcessingOrchestrator,
    catalog: MediaCatalog,
    variants: VariantManager,
    media_store: Arc<dyn MediaStore>,
    blobs: Arc<dyn BlobStore>,
    signed_url_ttl: Duration,
    stale_processing_after: Duration,
}

impl MediaService {
    pub fn new(deps: MediaServiceDeps) -> Self {
        let MediaServiceDeps {
            media_store,
            variant_store,
            blobs,
            extractor,
            transform,
            queue,
            ids,
            validator,
            signed_url_ttl,
            stale_processing_after,
        } = deps;

        let variants = VariantManager::new(media_store.clone(), variant_store, blobs.clone());
        let ingestor = UploadIngestor::new(
            media_store.clone(),
            blobs.clone(),
            extractor,
            transform.clone(),
            queue.clone(),
            ids.clone(),
            validator,
        );
        let orchestrator = ProcessingOrchestrator::new(
            media_store.clone(),
            blobs.clone(),
            transform,
            ids,
            variants.clone(),
        );
        let catalog = MediaCatalog::new(media_store.clone(), blobs.clone(), queue, variants.clone());

        Self {
            ingestor,
            orchestrator,
            catalog,
            variants,
            media_store,
            blobs,
            signed_url_ttl,
            stale_processing_after,
        }
    }

    pub async fn upload_media(&self, request: UploadRequest) -> Result<Media, AppError> {
        self.ingestor.upload(request).await
    }

    pub async fn upload_media_stream<S>(&self, chunks: S) -> Result<Media, AppError>
    where
        S: Stream<Item = Result<UploadChunk, AppError>> + Send,
    {
        self.ingestor.upload_stream(chunks).await
    }

    pub async fn get_media(&self, id: &str) -> Result<Media, AppError> {
        self.catalog.get(parse_id(id)?).await
    }

    pub async fn list_media(&self, filters: &ListFilters) -> Result<MediaPage, AppError> {
        self.catalog.list(filters).await
    }

    pub async fn update_media(
        &self,
        id: &str,
        actor: &str,
        patch: MediaPatch,
    ) -> Result<Media, AppError> {
        self.catalog.update(parse_id(id)?, actor, patch).await
    }

    pub async fn delete_media(&self, id: &str, actor: &str) -> Result<bool, AppError> {
        self.catalog.delete(parse_id(id)?, actor).await
    }

    pub async fn get_media_variants(&self, media_id: &str) -> Result<Vec<MediaVariant>, AppError> {
        self.variants.list_by_media(parse_id(media_id)?).await
    }

    pub async fn delete_variant(&self, variant_id: &str) -> Result<bool, AppError> {
        self.variants.delete(parse_id(variant_id)?).await
    }

    /// Run processing inline and return the record in its final state.
    pub async fn process_media(&self, id: &str) -> Result<Media, AppError> {
        self.orchestrator.process(parse_id(id)?).await
    }

    /// Process up to `limit` records still `pending`, oldest first, along with records stuck in
    /// `processing` for longer than `stale_processing_after`. Individual failures are logged;
    /// returns how many records were processed successfully.
    #[tracing::instrument(skip(self))]
    pub async fn process_pending(&self, limit: i64) -> Result<usize, AppError> {
        let stale_before = chrono::Duration::from_std(self.stale_processing_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let pending = self
            .media_store
            .list_pending_processing(stale_before, limit)
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut processed = 0;
        for media in &pending {
            match self.orchestrator.process(media.id).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, media_id = %media.id, "Pending sweep failed for media");
                }
            }
        }

        tracing::info!(
            found = pending.len(),
            processed = processed,
            "Pending sweep finished"
        );
        Ok(processed)
    }

    /// Time-limited locator for the primary blob of a media.
    pub async fn signed_url(&self, id: &str, ttl: Option<Duration>) -> Result<String, AppError> {
        let media = self.catalog.get(parse_id(id)?).await?;
        let url = self
            .blobs
            .signed_url(&media.storage_key, ttl.unwrap_or(self.signed_url_ttl))
            .await?;
        Ok(url)
    }

    async fn handle_process_task(&self, task: &Task) -> Result<serde_json::Value, AppError> {
        let payload: ProcessMediaPayload = task
            .payload_as()
            .map_err(|e| AppError::InvalidInput(format!("Invalid process payload: {}", e)))?;
        let media = self.orchestrator.process(payload.media_id).await?;
        Ok(json!({
            "media_id": media.id,
            "status": media.processing_status,
        }))
    }

    async fn handle_cleanup_task(&self, task: &Task) -> Result<serde_json::Value, AppError> {
        let payload: CleanupPayload = task
            .payload_as()
            .map_err(|e| AppError::InvalidInput(format!("Invalid cleanup payload: {}", e)))?;
        self.blobs.delete(&payload.storage_key).await?;
        tracing::info!(storage_key = %payload.storage_key, "Orphaned blob removed");
        Ok(json!({ "storage_key": payload.storage_key }))
    }
}

#[async_trait]
impl TaskHandlerContext for MediaService {
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> anyhow::Result<serde_json::Value> {
        let result = match task.kind {
            JobKind::ProcessMedia => self.handle_process_task(task).await,
            JobKind::Cleanup => self.handle_cleanup_task(task).await,
        };
        Ok(result?)
    }
}
