//! Processing status machine
//!
//! `pending -> processing -> completed | failed`, or `pending -> completed` directly for types
//! without renditions. Re-running on a terminal record repeats the same decision and skips
//! rendition slots that are already filled. A run cancelled after entering `processing` leaves
//! the record `failed` through [`ProcessingClaim`].

use std::sync::Arc;

use chrono::Utc;
use medialife_core::models::{Media, MediaVariant, ProcessingStatus};
use medialife_core::{AppError, IdGenerator};
use medialife_db::MediaStore;
use medialife_processing::{MediaTransform, Rendition, RenditionSpec};
use medialife_storage::keys::variant_key;
use medialife_storage::BlobStore;
use uuid::Uuid;

use crate::guards::{PendingBlob, ProcessingClaim};
use crate::variants::VariantManager;

pub struct ProcessingOrchestrator {
    media_store: Arc<dyn MediaStore>,
    blobs: Arc<dyn BlobStore>,
    transform: Arc<dyn MediaTransform>,
    ids: Arc<dyn IdGenerator>,
    variants: VariantManager,
}

impl ProcessingOrchestrator {
    pub fn new(
        media_store: Arc<dyn MediaStore>,
        blobs: Arc<dyn BlobStore>,
        transform: Arc<dyn MediaTransform>,
        ids: Arc<dyn IdGenerator>,
        variants: VariantManager,
    ) -> Self {
        Self {
            media_store,
            blobs,
            transform,
            ids,
            variants,
        }
    }

    /// Run processing for one media and return the record in its final state.
    #[tracing::instrument(skip(self), fields(media.id = %id))]
    pub async fn process(&self, id: Uuid) -> Result<Media, AppError> {
        let media = self
            .media_store
            .get_media(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;

        if !media.media_type.needs_processing() {
            let completed = self
                .media_store
                .update_processing_status(id, ProcessingStatus::Completed, Utc::now())
                .await?;
            tracing::info!(media_type = %media.media_type, "Media needs no processing, marked completed");
            return Ok(completed);
        }

        let media = self
            .media_store
            .update_processing_status(id, ProcessingStatus::Processing, Utc::now())
            .await?;
        let claim = ProcessingClaim::new(self.media_store.clone(), id);

        let outcome = match self.render_all(&media).await {
            Ok(created) => self
                .media_store
                .update_processing_status(id, ProcessingStatus::Completed, Utc::now())
                .await
                .map(|media| (media, created)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((media, created)) => {
                claim.release();
                tracing::info!(variants_created = created, "Media processing completed");
                Ok(media)
            }
            Err(e) => {
                tracing::error!(error = %e, "Media processing failed");
                self.mark_failed(id).await;
                claim.release();
                Err(e)
            }
        }
    }

    /// Best-effort so the processing error stays the one reported.
    async fn mark_failed(&self, id: Uuid) {
        if let Err(e) = self
            .media_store
            .update_processing_status(id, ProcessingStatus::Failed, Utc::now())
            .await
        {
            tracing::error!(error = %e, media_id = %id, "Failed to mark media as failed");
        }
    }

    /// Render every missing rendition slot. Returns how many variants were created.
    async fn render_all(&self, media: &Media) -> Result<usize, AppError> {
        let specs = self.transform.renditions(media.media_type);
        if specs.is_empty() {
            return Ok(0);
        }

        let source = self.blobs.get(&media.storage_key).await?;
        let mut created = 0;

        for spec in &specs {
            if let Some(existing) = self
                .variants
                .find(media.id, spec.variant_type, &spec.size)
                .await?
            {
                tracing::debug!(
                    variant_id = %existing.id,
                    variant_type = %spec.variant_type,
                    size = %spec.size,
                    "Variant already exists, skipping"
                );
                continue;
            }

            let rendition = self.transform.render(media, source.clone(), spec).await?;
            if self.store_rendition(media, spec, rendition).await?.is_some() {
                created += 1;
            }
        }

        Ok(created)
    }

    /// `None` when a concurrent run filled the slot first; the rendition's blob is removed.
    async fn store_rendition(
        &self,
        media: &Media,
        spec: &RenditionSpec,
        rendition: Rendition,
    ) -> Result<Option<MediaVariant>, AppError> {
        let variant_id = self.ids.generate();
        let storage_key = variant_key(media.id, variant_id, &rendition.format);
        let file_size = rendition.data.len() as i64;

        let url = self
            .blobs
            .put(&storage_key, &rendition.content_type, rendition.data)
            .await?;
        let pending = PendingBlob::new(self.blobs.clone(), storage_key.clone());

        let variant = MediaVariant {
            id: variant_id,
            media_id: media.id,
            variant_type: spec.variant_type,
            size: spec.size.clone(),
            format: rendition.format,
            url,
            storage_key,
            file_size,
            width: rendition.width.and_then(|w| i32::try_from(w).ok()),
            height: rendition.height.and_then(|h| i32::try_from(h).ok()),
            quality: rendition.quality.map(i32::from),
            created_at: Utc::now(),
        };

        match self.variants.create(&variant).await {
            Ok(Some(created)) => {
                pending.commit();
                Ok(Some(created))
            }
            Ok(None) => {
                pending.rollback().await;
                Ok(None)
            }
            Err(e) => {
                pending.rollback().await;
                Err(e)
            }
        }
    }
}
