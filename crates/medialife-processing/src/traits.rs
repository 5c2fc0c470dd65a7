//! Core traits for media processing
//!
//! The lifecycle core decides *when* to extract and render; implementations of these traits
//! decide *how*.

use async_trait::async_trait;
use bytes::Bytes;
use medialife_core::models::{Media, MediaType, VariantType};
use medialife_core::AppError;

use crate::metadata::ExtractedMetadata;

/// Reads dimensions and duration from raw bytes.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Fails with `AppError::Extraction` when the payload cannot be decoded. Whether that is
    /// fatal is up to the caller.
    async fn extract(
        &self,
        media_type: MediaType,
        data: Bytes,
    ) -> Result<ExtractedMetadata, AppError>;
}

/// One rendition a media type should end up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionSpec {
    pub variant_type: VariantType,
    /// Size class; empty for non-thumbnail renditions.
    pub size: String,
    /// Bounding box; `None` keeps the source dimensions.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub format: String,
    pub quality: Option<u8>,
}

impl RenditionSpec {
    pub fn thumbnail(size: &str, max_width: u32, max_height: u32, quality: u8) -> Self {
        Self {
            variant_type: VariantType::Thumbnail,
            size: size.to_string(),
            max_width: Some(max_width),
            max_height: Some(max_height),
            format: "jpeg".to_string(),
            quality: Some(quality),
        }
    }

    pub fn converted(format: &str, quality: Option<u8>) -> Self {
        Self {
            variant_type: VariantType::Converted,
            size: String::new(),
            max_width: None,
            max_height: None,
            format: format.to_string(),
            quality,
        }
    }
}

/// Encoded output of a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub data: Bytes,
    pub format: String,
    pub content_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
}

/// Opaque rendering capability.
#[async_trait]
pub trait MediaTransform: Send + Sync {
    /// Renditions a media of this type needs. Empty for types that need no processing.
    fn renditions(&self, media_type: MediaType) -> Vec<RenditionSpec>;

    /// Produce one rendition from the source payload. Fails with `AppError::Processing`.
    async fn render(
        &self,
        media: &Media,
        source: Bytes,
        spec: &RenditionSpec,
    ) -> Result<Rendition, AppError>;

    /// Canonical stored representation for streamed uploads.
    async fn normalize(&self, source: Bytes) -> Result<Rendition, AppError>;
}
