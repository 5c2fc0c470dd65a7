use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use image::{ImageFormat, Rgba, RgbaImage};
use medialife_core::constants::SUPPORTED_CONTENT_TYPES;
use medialife_core::models::{Media, MediaType, MediaVariant, ProcessingStatus, VariantType};
use medialife_core::{IdGenerator, SequentialIdGenerator};
use medialife_db::{InMemoryStore, MediaStore};
use medialife_processing::{
    DefaultMediaTransform, DefaultMetadataExtractor, ExtractedMetadata, MediaTransform,
    MetadataExtractor, StaticMetadataExtractor, StaticTransform, UploadValidator,
};
use medialife_storage::keys::{media_key, variant_key};
use medialife_storage::{BlobStore, InMemoryBlobStore};
use medialife_worker::RecordingTaskQueue;
use uuid::Uuid;

use crate::catalog::MediaCatalog;
use crate::ingest::UploadIngestor;
use crate::orchestrator::ProcessingOrchestrator;
use crate::service::{MediaService, MediaServiceDeps};
use crate::variants::VariantManager;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn variant(id: Uuid, media_id: Uuid, size: &str, offset_secs: i64) -> MediaVariant {
    MediaVariant {
        id,
        media_id,
        variant_type: VariantType::Thumbnail,
        size: size.to_string(),
        format: "jpeg".to_string(),
        url: format!("memory://variants/{}/{}.jpeg", media_id, id),
        storage_key: variant_key(media_id, id, "jpeg"),
        file_size: 1,
        width: Some(150),
        height: Some(150),
        quality: Some(85),
        created_at: Utc::now() + chrono::Duration::seconds(offset_secs),
    }
}

/// In-memory collaborators plus constructors for every component under test.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub extractor: Arc<StaticMetadataExtractor>,
    pub transform: Arc<StaticTransform>,
    pub queue: Arc<RecordingTaskQueue>,
    pub ids: Arc<SequentialIdGenerator>,
    allowed: Vec<String>,
    validator: UploadValidator,
    real_codecs: Option<(Arc<dyn MetadataExtractor>, Arc<dyn MediaTransform>)>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_allowed(&[])
    }

    /// Default allow-list extended with `extra` content types. Uploads are capped at 1 KiB.
    pub fn with_allowed(extra: &[&str]) -> Self {
        let allowed: Vec<String> = SUPPORTED_CONTENT_TYPES
            .iter()
            .chain(extra.iter())
            .map(|ct| ct.to_string())
            .collect();

        Self {
            store: Arc::new(InMemoryStore::new()),
            blobs: Arc::new(InMemoryBlobStore::new()),
            extractor: Arc::new(StaticMetadataExtractor::new(ExtractedMetadata {
                width: Some(640),
                height: Some(480),
                duration: None,
                format: Some("png".to_string()),
            })),
            transform: Arc::new(StaticTransform::new()),
            queue: Arc::new(RecordingTaskQueue::new()),
            ids: Arc::new(SequentialIdGenerator::new()),
            validator: UploadValidator::new(1024, allowed.clone()),
            allowed,
            real_codecs: None,
        }
    }

    /// Image decoding through the `image` crate and no ffmpeg. Uploads may be up to 1 MiB.
    pub fn with_default_codecs() -> Self {
        Self::with_default_codecs_allowing(&[])
    }

    pub fn with_default_codecs_allowing(extra: &[&str]) -> Self {
        let mut h = Self::with_allowed(extra);
        h.validator = UploadValidator::new(1024 * 1024, h.allowed.clone());
        h.real_codecs = Some((
            Arc::new(DefaultMetadataExtractor::new(None)),
            Arc::new(DefaultMediaTransform::new(85, None, 1.0)),
        ));
        h
    }

    fn extractor_dyn(&self) -> Arc<dyn MetadataExtractor> {
        match &self.real_codecs {
            Some((extractor, _)) => extractor.clone(),
            None => self.extractor.clone() as Arc<dyn MetadataExtractor>,
        }
    }

    fn transform_dyn(&self) -> Arc<dyn MediaTransform> {
        match &self.real_codecs {
            Some((_, transform)) => transform.clone(),
            None => self.transform.clone() as Arc<dyn MediaTransform>,
        }
    }

    pub fn variants(&self) -> VariantManager {
        VariantManager::new(self.store.clone(), self.store.clone(), self.blobs.clone())
    }

    pub fn ingestor(&self) -> UploadIngestor {
        UploadIngestor::new(
            self.store.clone(),
            self.blobs.clone(),
            self.extractor_dyn(),
            self.transform_dyn(),
            self.queue.clone(),
            self.ids.clone(),
            self.validator.clone(),
        )
    }

    pub fn orchestrator(&self) -> ProcessingOrchestrator {
        ProcessingOrchestrator::new(
            self.store.clone(),
            self.blobs.clone(),
            self.transform_dyn(),
            self.ids.clone(),
            self.variants(),
        )
    }

    pub fn catalog(&self) -> MediaCatalog {
        MediaCatalog::new(
            self.store.clone(),
            self.blobs.clone(),
            self.queue.clone(),
            self.variants(),
        )
    }

    pub fn service(&self) -> Arc<MediaService> {
        Arc::new(MediaService::new(MediaServiceDeps {
            media_store: self.store.clone(),
            variant_store: self.store.clone(),
            blobs: self.blobs.clone(),
            extractor: self.extractor_dyn(),
            transform: self.transform_dyn(),
            queue: self.queue.clone(),
            ids: self.ids.clone(),
            validator: self.validator.clone(),
            signed_url_ttl: Duration::from_secs(3600),
            stale_processing_after: Duration::from_secs(3600),
        }))
    }

    /// A row with no blob behind it, metadata `tag=foo, album=summer`.
    pub async fn seed_media(&self, owner: &str) -> Media {
        let id = self.ids.generate();
        let now = Utc::now();
        let media = Media {
            id,
            created_by: owner.to_string(),
            name: "a.png".to_string(),
            size: 3,
            url: format!("memory://media/{}", id),
            storage_key: format!("media/{}-a.png", id),
            mime_type: "image/png".to_string(),
            media_type: MediaType::Image,
            width: None,
            height: None,
            duration: None,
            processing_status: ProcessingStatus::Pending,
            metadata: HashMap::from([
                ("tag".to_string(), "foo".to_string()),
                ("album".to_string(), "summer".to_string()),
            ]),
            created_at: now,
            updated_at: now,
        };
        self.store.create_media(&media).await.unwrap()
    }

    /// A pending row with its primary blob stored, as a batch upload leaves it.
    pub async fn seed_uploaded(&self, owner: &str, mime_type: &str, data: &'static [u8]) -> Media {
        let id = self.ids.generate();
        let storage_key = media_key(id, "seed", mime_type);
        let url = self
            .blobs
            .put(&storage_key, mime_type, Bytes::from_static(data))
            .await
            .unwrap();
        let now = Utc::now();
        let media = Media {
            id,
            created_by: owner.to_string(),
            name: "seed".to_string(),
            size: data.len() as i64,
            url,
            storage_key,
            mime_type: mime_type.to_string(),
            media_type: MediaType::from_mime(mime_type),
            width: None,
            height: None,
            duration: None,
            processing_status: ProcessingStatus::Pending,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.create_media(&media).await.unwrap()
    }
}
