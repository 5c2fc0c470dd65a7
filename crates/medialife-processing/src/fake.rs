//! Deterministic in-memory implementations for tests and dry runs
//!
//! Neither type decodes anything, so tiny placeholder payloads flow through the whole lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use medialife_core::models::{Media, MediaType};
use medialife_core::AppError;

use crate::defaults::{image_renditions, video_renditions};
use crate::metadata::ExtractedMetadata;
use crate::traits::{MediaTransform, MetadataExtractor, Rendition, RenditionSpec};

/// Returns the same metadata for every payload, or fails on demand.
#[derive(Debug, Default)]
pub struct StaticMetadataExtractor {
    metadata: ExtractedMetadata,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl StaticMetadataExtractor {
    pub fn new(metadata: ExtractedMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataExtractor for StaticMetadataExtractor {
    async fn extract(
        &self,
        _media_type: MediaType,
        _data: Bytes,
    ) -> Result<ExtractedMetadata, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Extraction("injected extraction failure".to_string()));
        }
        Ok(self.metadata.clone())
    }
}

/// Produces placeholder renditions with the same rendition sets as the production transform.
#[derive(Debug)]
pub struct StaticTransform {
    image_specs: Vec<RenditionSpec>,
    video_specs: Vec<RenditionSpec>,
    canonical: Bytes,
    fail_render: AtomicBool,
    /// Render calls allowed to succeed before failures start; `usize::MAX` disables it.
    fail_after: AtomicUsize,
    fail_normalize: AtomicBool,
    render_calls: AtomicUsize,
    render_delay_ms: AtomicU64,
}

impl StaticTransform {
    pub fn new() -> Self {
        Self::with_renditions(image_renditions(85), video_renditions(85))
    }

    pub fn with_renditions(image_specs: Vec<RenditionSpec>, video_specs: Vec<RenditionSpec>) -> Self {
        Self {
            image_specs,
            video_specs,
            canonical: Bytes::from_static(b"RIFF\0\0\0\0WEBPVP8L"),
            fail_render: AtomicBool::new(false),
            fail_after: AtomicUsize::new(usize::MAX),
            fail_normalize: AtomicBool::new(false),
            render_calls: AtomicUsize::new(0),
            render_delay_ms: AtomicU64::new(0),
        }
    }

    /// Payload returned by `normalize`.
    pub fn with_canonical(mut self, canonical: Bytes) -> Self {
        self.canonical = canonical;
        self
    }

    pub fn canonical(&self) -> &Bytes {
        &self.canonical
    }

    pub fn set_fail_render(&self, fail: bool) {
        self.fail_render.store(fail, Ordering::SeqCst);
    }

    /// Let `n` renders succeed, then fail every later one.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_normalize(&self, fail: bool) {
        self.fail_normalize.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long at the start of every render.
    pub fn set_render_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.render_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTransform for StaticTransform {
    fn renditions(&self, media_type: MediaType) -> Vec<RenditionSpec> {
        match media_type {
            MediaType::Image => self.image_specs.clone(),
            MediaType::Video => self.video_specs.clone(),
            MediaType::Audio | MediaType::Other => Vec::new(),
        }
    }

    async fn render(
        &self,
        media: &Media,
        _source: Bytes,
        spec: &RenditionSpec,
    ) -> Result<Rendition, AppError> {
        let delay_ms = self.render_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let previous = self.render_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_render.load(Ordering::SeqCst)
            || previous >= self.fail_after.load(Ordering::SeqCst)
        {
            return Err(AppError::Processing(format!(
                "injected render failure for {} {}",
                media.id, spec.variant_type
            )));
        }

        let data = Bytes::from(format!("{}:{}:{}", spec.variant_type, spec.size, spec.format));
        Ok(Rendition {
            data,
            format: spec.format.clone(),
            content_type: format!("image/{}", spec.format),
            width: spec.max_width,
            height: spec.max_height,
            quality: spec.quality,
        })
    }

    async fn normalize(&self, _source: Bytes) -> Result<Rendition, AppError> {
        if self.fail_normalize.load(Ordering::SeqCst) {
            return Err(AppError::Processing("injected normalize failure".to_string()));
        }
        Ok(Rendition {
            data: self.canonical.clone(),
            format: "webp".to_string(),
            content_type: "image/webp".to_string(),
            width: None,
            height: None,
            quality: None,
        })
    }
}
