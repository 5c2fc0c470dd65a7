//! RAII guards for state that must not outlive a cancelled future: an upload's scratch file, a
//! blob written ahead of the database commit, and a record left in `processing`.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use medialife_core::models::ProcessingStatus;
use medialife_core::AppError;
use medialife_db::MediaStore;
use medialife_storage::BlobStore;
use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

/// Scratch file for a streamed upload. The file is removed when the guard is dropped, including
/// when the owning future is cancelled.
pub struct ScratchBuffer {
    file: tokio::fs::File,
    path: TempPath,
    written: u64,
}

impl ScratchBuffer {
    pub fn new() -> Result<Self, AppError> {
        Self::from_named(tempfile::NamedTempFile::new()?)
    }

    pub fn new_in(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        Self::from_named(tempfile::NamedTempFile::new_in(dir)?)
    }

    fn from_named(named: tempfile::NamedTempFile) -> Result<Self, AppError> {
        let (file, path) = named.into_parts();
        Ok(Self {
            file: tokio::fs::File::from_std(file),
            path,
            written: 0,
        })
    }

    /// Append a chunk and return the running byte count.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<u64, AppError> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(self.written)
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewind and read back everything written so far.
    pub async fn read_all(&mut self) -> Result<Bytes, AppError> {
        self.file.flush().await?;
        self.file.seek(std::io::SeekFrom::Start(0)).await?;
        let mut data = Vec::with_capacity(self.written as usize);
        self.file.read_to_end(&mut data).await?;
        Ok(Bytes::from(data))
    }
}

/// A blob that exists in the store but is not yet referenced by a committed row.
///
/// Call [`PendingBlob::commit`] once the row is persisted, or [`PendingBlob::rollback`] on an
/// error path. A guard dropped while still armed deletes the blob from a spawned task.
pub struct PendingBlob {
    blobs: Arc<dyn BlobStore>,
    key: String,
    armed: bool,
}

impl PendingBlob {
    pub fn new(blobs: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
            armed: true,
        }
    }

    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Delete the blob now. Failures are logged; the caller is already propagating an error.
    pub async fn rollback(mut self) {
        self.armed = false;
        compensate(self.blobs.clone(), std::mem::take(&mut self.key), "rollback").await;
    }
}

impl Drop for PendingBlob {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let blobs = self.blobs.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(compensate(blobs, key, "cancelled before commit"));
            }
            Err(_) => {
                tracing::error!(
                    storage_key = %key,
                    "No runtime available to delete uncommitted blob; it is orphaned"
                );
            }
        }
    }
}

async fn compensate(blobs: Arc<dyn BlobStore>, key: String, reason: &'static str) {
    match blobs.delete(&key).await {
        Ok(()) => tracing::info!(storage_key = %key, reason, "Deleted uncommitted blob"),
        Err(e) => tracing::error!(
            error = %e,
            storage_key = %key,
            reason,
            "Failed to delete uncommitted blob"
        ),
    }
}

/// A record moved to `processing` whose outcome has not been written yet.
///
/// Release it once the caller has written a terminal status. A guard dropped while still armed
/// (the processing future was cancelled or timed out) marks the record `failed` from a spawned
/// task.
pub struct ProcessingClaim {
    media_store: Arc<dyn MediaStore>,
    id: Uuid,
    armed: bool,
}

impl ProcessingClaim {
    pub fn new(media_store: Arc<dyn MediaStore>, id: Uuid) -> Self {
        Self {
            media_store,
            id,
            armed: true,
        }
    }

    pub fn release(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingClaim {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let media_store = self.media_store.clone();
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match media_store
                        .update_processing_status(id, ProcessingStatus::Failed, Utc::now())
                        .await
                    {
                        Ok(_) => tracing::warn!(
                            media_id = %id,
                            "Processing was cancelled, media marked failed"
                        ),
                        Err(e) => tracing::error!(
                            error = %e,
                            media_id = %id,
                            "Failed to mark cancelled processing as failed"
                        ),
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    media_id = %id,
                    "No runtime available to mark cancelled processing as failed"
                );
            }
        }
    }
}
