//! Upload ingestion: batch payloads and streamed chunk sequences.
//!
//! Validation happens before any side effect. Once a blob is written, a [`PendingBlob`] guard
//! makes sure it does not outlive a failed or cancelled database commit.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use medialife_core::models::{JobKind, Media, MediaType, ProcessMediaPayload, ProcessingStatus};
use medialife_core::{AppError, IdGenerator};
use medialife_db::MediaStore;
use medialife_processing::{ExtractedMetadata, MediaTransform, MetadataExtractor, UploadValidator};
use medialife_storage::keys::{canonical_media_key, media_key};
use medialife_storage::BlobStore;
use medialife_worker::TaskQueue;

use crate::guards::{PendingBlob, ScratchBuffer};

/// A complete upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
    pub created_by: String,
    pub metadata: HashMap<String, String>,
    /// Size announced by the caller. Only compared against the received bytes.
    pub expected_size: Option<u64>,
}

/// Header of a streamed upload.
#[derive(Debug, Clone, Default)]
pub struct UploadInfo {
    pub file_name: String,
    pub created_by: String,
    pub metadata: HashMap<String, String>,
    pub expected_size: Option<u64>,
}

/// One element of a streamed upload.
#[derive(Debug, Clone)]
pub enum UploadChunk {
    Info(UploadInfo),
    Data(Bytes),
}

pub struct UploadIngestor {
    media_store: Arc<dyn MediaStore>,
    blobs: Arc<dyn BlobStore>,
    extractor: Arc<dyn MetadataExtractor>,
    transform: Arc<dyn MediaTransform>,
    queue: Arc<dyn TaskQueue>,
    ids: Arc<dyn IdGenerator>,
    validator: UploadValidator,
    scratch_dir: Option<PathBuf>,
}

impl UploadIngestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        media_store: Arc<dyn MediaStore>,
        blobs: Arc<dyn BlobStore>,
        extractor: Arc<dyn MetadataExtractor>,
        transform: Arc<dyn MediaTransform>,
        queue: Arc<dyn TaskQueue>,
        ids: Arc<dyn IdGenerator>,
        validator: UploadValidator,
    ) -> Self {
        Self {
            media_store,
            blobs,
            extractor,
            transform,
            queue,
            ids,
            validator,
            scratch_dir: None,
        }
    }

    /// Put scratch files for streamed uploads in `dir` instead of the system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    fn scratch(&self) -> Result<ScratchBuffer, AppError> {
        match &self.scratch_dir {
            Some(dir) => ScratchBuffer::new_in(dir),
            None => ScratchBuffer::new(),
        }
    }

    /// Batch upload: store the payload as-is, extract metadata best-effort, persist the row as
    /// `pending` and hand processing to the queue (or complete it directly).
    #[tracing::instrument(skip(self, request), fields(
        upload.file_name = %request.file_name,
        upload.mime_type = %request.mime_type,
        upload.created_by = %request.created_by,
        upload.size = request.data.len()
    ))]
    pub async fn upload(&self, request: UploadRequest) -> Result<Media, AppError> {
        let UploadRequest {
            file_name,
            mime_type,
            data,
            created_by,
            metadata,
            expected_size,
        } = request;

        let content_type =
            self.validator
                .validate_batch(&file_name, &mime_type, &created_by, data.len() as u64)?;
        warn_on_size_mismatch(expected_size, data.len() as u64);

        let id = self.ids.generate();
        let media_type = MediaType::from_mime(&content_type);
        let storage_key = media_key(id, &file_name, &content_type);

        let url = self
            .blobs
            .put(&storage_key, &content_type, data.clone())
            .await?;
        let pending = PendingBlob::new(self.blobs.clone(), storage_key.clone());

        let extracted = match self.extractor.extract(media_type, data.clone()).await {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    media_id = %id,
                    media_type = %media_type,
                    "Metadata extraction failed, continuing without dimensions"
                );
                ExtractedMetadata::default()
            }
        };

        let now = Utc::now();
        let media = Media {
            id,
            created_by,
            name: file_name,
            size: data.len() as i64,
            url,
            storage_key,
            mime_type: content_type,
            media_type,
            width: extracted.width_i32(),
            height: extracted.height_i32(),
            duration: extracted.duration,
            processing_status: ProcessingStatus::Pending,
            metadata,
            created_at: now,
            updated_at: now,
        };

        let media = match self.media_store.create_media(&media).await {
            Ok(media) => {
                pending.commit();
                media
            }
            Err(e) => {
                tracing::error!(error = %e, media_id = %id, "Failed to persist media, removing blob");
                pending.rollback().await;
                return Err(e);
            }
        };

        tracing::info!(
            media_id = %media.id,
            size_bytes = media.size,
            media_type = %media.media_type,
            "Media uploaded"
        );

        Ok(self.schedule_processing(media).await)
    }

    /// Enqueue processing for types that need it; complete the rest in place. The row is already
    /// committed, so failures here are logged and leave the record `pending` for the sweep.
    async fn schedule_processing(&self, media: Media) -> Media {
        if !media.media_type.needs_processing() {
            return match self
                .media_store
                .update_processing_status(media.id, ProcessingStatus::Completed, Utc::now())
                .await
            {
                Ok(updated) => updated,
                Err(e) => {
                    tracing::warn!(error = %e, media_id = %media.id, "Failed to mark media completed");
                    media
                }
            };
        }

        let payload = match serde_json::to_value(ProcessMediaPayload { media_id: media.id }) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, media_id = %media.id, "Failed to build processing payload");
                return media;
            }
        };

        match self.queue.enqueue(JobKind::ProcessMedia, payload).await {
            Ok(task_id) => {
                tracing::debug!(media_id = %media.id, task_id = %task_id, "Processing enqueued");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    media_id = %media.id,
                    "Failed to enqueue processing, media stays pending"
                );
            }
        }
        media
    }

    /// Streamed upload: buffer chunks in order, require decodable metadata, store the canonical
    /// encoding and persist the row as `completed`.
    #[tracing::instrument(skip(self, chunks))]
    pub async fn upload_stream<S>(&self, chunks: S) -> Result<Media, AppError>
    where
        S: Stream<Item = Result<UploadChunk, AppError>> + Send,
    {
        let mut scratch = self.scratch()?;
        let mut info: Option<UploadInfo> = None;
        let mut chunks = std::pin::pin!(chunks);

        while let Some(chunk) = chunks.next().await {
            match chunk? {
                UploadChunk::Info(header) => {
                    if info.is_some() {
                        return Err(AppError::InvalidInput(
                            "Upload info sent more than once".to_string(),
                        ));
                    }
                    self.validator.validate_file_name(&header.file_name)?;
                    self.validator.validate_creator(&header.created_by)?;
                    info = Some(header);
                }
                UploadChunk::Data(bytes) => {
                    let received = scratch.write(&bytes).await?;
                    self.validator.check_running_size(received)?;
                }
            }
        }

        let info = info.ok_or_else(|| AppError::InvalidInput("Missing upload info".to_string()))?;
        let received = scratch.written();
        self.validator.validate_file_size(received)?;
        warn_on_size_mismatch(info.expected_size, received);

        let data = scratch.read_all().await?;

        // Streamed uploads must decode; there is no pending state to fall back on.
        let extracted = self.extractor.extract(MediaType::Image, data.clone()).await?;
        let canonical = self.transform.normalize(data).await?;

        let id = self.ids.generate();
        let storage_key = canonical_media_key(id, &info.file_name);
        let stored_size = canonical.data.len() as i64;

        let url = self
            .blobs
            .put(&storage_key, &canonical.content_type, canonical.data.clone())
            .await?;
        let pending = PendingBlob::new(self.blobs.clone(), storage_key.clone());

        let now = Utc::now();
        let media = Media {
            id,
            created_by: info.created_by,
            name: info.file_name,
            size: stored_size,
            url,
            storage_key,
            mime_type: canonical.content_type.clone(),
            media_type: MediaType::Image,
            width: canonical
                .width
                .and_then(|w| i32::try_from(w).ok())
                .or(extracted.width_i32()),
            height: canonical
                .height
                .and_then(|h| i32::try_from(h).ok())
                .or(extracted.height_i32()),
            duration: None,
            processing_status: ProcessingStatus::Completed,
            metadata: info.metadata,
            created_at: now,
            updated_at: now,
        };

        match self.media_store.create_media(&media).await {
            Ok(media) => {
                pending.commit();
                tracing::info!(
                    media_id = %media.id,
                    received_bytes = received,
                    size_bytes = media.size,
                    "Streamed media uploaded"
                );
                Ok(media)
            }
            Err(e) => {
                tracing::error!(error = %e, media_id = %id, "Failed to persist streamed media, removing blob");
                pending.rollback().await;
                Err(e)
            }
        }
    }
}

fn warn_on_size_mismatch(expected: Option<u64>, actual: u64) {
    if let Some(expected) = expected {
        if expected != actual {
            tracing::warn!(
                expected_size = expected,
                actual_size = actual,
                "Declared upload size does not match received bytes"
            );
        }
    }
}
