//! Service wiring from configuration

use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use medialife_core::{Config, UuidGenerator};
use medialife_db::{
    setup_database, InMemoryStore, MediaStore, PgMediaStore, PgVariantStore, VariantStore,
};
use medialife_processing::{
    ffprobe_path_for, DefaultMediaTransform, DefaultMetadataExtractor, UploadValidator,
    VideoProbe, VideoThumbnailer,
};
use medialife_storage::create_blob_store;
use medialife_worker::{LocalTaskQueue, TaskHandlerContext, TaskQueueConfig};

use crate::service::{MediaService, MediaServiceDeps};

/// A running service and the queue whose workers dispatch into it.
pub struct ServiceHandle {
    pub service: Arc<MediaService>,
    pub queue: Arc<LocalTaskQueue>,
}

impl ServiceHandle {
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

/// Build the service with production adapters. Must be called inside a tokio runtime, since the
/// queue spawns its worker pool immediately.
pub async fn build_media_service(config: &Config) -> Result<ServiceHandle> {
    let blobs = create_blob_store(config)
        .await
        .context("Failed to initialize blob storage")?;
    tracing::info!(backend = %blobs.backend_type(), "Blob storage initialized");

    let (media_store, variant_store): (Arc<dyn MediaStore>, Arc<dyn VariantStore>) =
        match config.database_url() {
            Some(url) => {
                let pool = setup_database(
                    url,
                    config.db_max_connections(),
                    config.db_timeout_seconds(),
                )
                .await?;
                let media: Arc<dyn MediaStore> = Arc::new(PgMediaStore::new(pool.clone()));
                let variants: Arc<dyn VariantStore> = Arc::new(PgVariantStore::new(pool));
                (media, variants)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
                let store = Arc::new(InMemoryStore::new());
                let media: Arc<dyn MediaStore> = store.clone();
                let variants: Arc<dyn VariantStore> = store;
                (media, variants)
            }
        };

    let (probe, thumbnailer) = match config.ffmpeg_path() {
        Some(ffmpeg) => {
            let probe = VideoProbe::new(ffprobe_path_for(ffmpeg)).context("Invalid ffprobe path")?;
            let thumbnailer =
                VideoThumbnailer::new(ffmpeg.to_string()).context("Invalid FFMPEG_PATH")?;
            tracing::info!(ffmpeg_path = %ffmpeg, "Video processing enabled");
            (Some(probe), Some(thumbnailer))
        }
        None => {
            tracing::warn!("FFMPEG_PATH not set, video uploads will fail processing");
            (None, None)
        }
    };

    let extractor = Arc::new(DefaultMetadataExtractor::new(probe));
    let transform = Arc::new(DefaultMediaTransform::new(
        config.image_quality(),
        thumbnailer,
        config.video_thumbnail_offset_secs(),
    ));
    let validator = UploadValidator::new(
        config.max_file_size_bytes(),
        config.allowed_content_types().to_vec(),
    );
    let queue_config = TaskQueueConfig::from_config(config);
    let signed_url_ttl = Duration::from_secs(config.signed_url_ttl_secs());
    let stale_processing_after = queue_config.task_timeout;

    let mut queue_slot: Option<Arc<LocalTaskQueue>> = None;
    let service = Arc::new_cyclic(|weak: &Weak<MediaService>| {
        let context: Weak<dyn TaskHandlerContext> = weak.clone();
        let queue = Arc::new(LocalTaskQueue::new(queue_config, context));
        queue_slot = Some(queue.clone());

        MediaService::new(MediaServiceDeps {
            media_store,
            variant_store,
            blobs,
            extractor,
            transform,
            queue,
            ids: Arc::new(UuidGenerator),
            validator,
            signed_url_ttl,
            stale_processing_after,
        })
    });
    let queue = queue_slot.context("Task queue was not created")?;

    tracing::info!(
        environment = %config.environment(),
        max_workers = queue.config().max_workers,
        "Media service ready"
    );

    Ok(ServiceHandle { service, queue })
}
