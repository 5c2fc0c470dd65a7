//! Production implementations of the processing capabilities

use async_trait::async_trait;
use bytes::Bytes;
use medialife_core::constants::THUMBNAIL_SIZES;
use medialife_core::models::{Media, MediaType};
use medialife_core::AppError;

use crate::image::{ImageMetadataExtractor, ImageTransform};
use crate::metadata::ExtractedMetadata;
use crate::traits::{MediaTransform, MetadataExtractor, Rendition, RenditionSpec};
use crate::video::{VideoProbe, VideoThumbnailer};

/// Renditions produced for every image: a full-size JPEG plus one thumbnail per size class.
pub fn image_renditions(quality: u8) -> Vec<RenditionSpec> {
    let mut specs = vec![RenditionSpec::converted("jpeg", Some(quality))];
    specs.extend(
        THUMBNAIL_SIZES
            .iter()
            .map(|(size, w, h)| RenditionSpec::thumbnail(size, *w, *h, quality)),
    );
    specs
}

/// Videos get a single poster frame in the largest thumbnail slot.
pub fn video_renditions(quality: u8) -> Vec<RenditionSpec> {
    THUMBNAIL_SIZES
        .last()
        .map(|(size, w, h)| vec![RenditionSpec::thumbnail(size, *w, *h, quality)])
        .unwrap_or_default()
}

/// Images through the `image` crate, videos through ffprobe when available
pub struct DefaultMetadataExtractor {
    image: ImageMetadataExtractor,
    video: Option<VideoProbe>,
}

impl DefaultMetadataExtractor {
    pub fn new(video: Option<VideoProbe>) -> Self {
        Self {
            image: ImageMetadataExtractor,
            video,
        }
    }
}

#[async_trait]
impl MetadataExtractor for DefaultMetadataExtractor {
    async fn extract(
        &self,
        media_type: MediaType,
        data: Bytes,
    ) -> Result<ExtractedMetadata, AppError> {
        match media_type {
            MediaType::Image => Ok(self.image.extract(data).await?.into()),
            MediaType::Video => match &self.video {
                Some(probe) => Ok(probe.probe(data).await?.into()),
                None => Err(AppError::Extraction(
                    "Video metadata requires FFMPEG_PATH to be configured".to_string(),
                )),
            },
            // Nothing to read for these
            MediaType::Audio | MediaType::Other => Ok(ExtractedMetadata::default()),
        }
    }
}

/// JPEG renditions for images, an ffmpeg poster frame for videos
pub struct DefaultMediaTransform {
    quality: u8,
    image: ImageTransform,
    video: Option<VideoThumbnailer>,
    poster_offset_secs: f64,
}

impl DefaultMediaTransform {
    pub fn new(quality: u8, video: Option<VideoThumbnailer>, poster_offset_secs: f64) -> Self {
        Self {
            quality,
            image: ImageTransform::new(quality),
            video,
            poster_offset_secs,
        }
    }
}

#[async_trait]
impl MediaTransform for DefaultMediaTransform {
    fn renditions(&self, media_type: MediaType) -> Vec<RenditionSpec> {
        match media_type {
            MediaType::Image => image_renditions(self.quality),
            MediaType::Video => video_renditions(self.quality),
            MediaType::Audio | MediaType::Other => Vec::new(),
        }
    }

    async fn render(
        &self,
        media: &Media,
        source: Bytes,
        spec: &RenditionSpec,
    ) -> Result<Rendition, AppError> {
        match media.media_type {
            MediaType::Image => self.image.render(source, spec).await,
            MediaType::Video => {
                let thumbnailer = self.video.as_ref().ok_or_else(|| {
                    AppError::Processing(
                        "Video processing requires FFMPEG_PATH to be configured".to_string(),
                    )
                })?;
                let frame = thumbnailer
                    .extract_frame(source, self.poster_offset_secs)
                    .await?;
                // The frame is re-encoded so it respects the slot's bounding box.
                self.image.render(frame, spec).await
            }
            other => Err(AppError::Processing(format!(
                "No renditions for media type {}",
                other
            ))),
        }
    }

    async fn normalize(&self, source: Bytes) -> Result<Rendition, AppError> {
        self.image.normalize(source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::fixtures;
    use chrono::Utc;
    use medialife_core::models::{ProcessingStatus, VariantType};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn media(media_type: MediaType) -> Media {
        let now = Utc::now();
        Media {
            id: Uuid::from_u128(1),
            created_by: "u1".to_string(),
            name: "clip".to_string(),
            size: 3,
            url: "memory://media/1".to_string(),
            storage_key: "media/1".to_string(),
            mime_type: "video/mp4".to_string(),
            media_type,
            width: None,
            height: None,
            duration: None,
            processing_status: ProcessingStatus::Processing,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rendition_sets() {
        let transform = DefaultMediaTransform::new(85, None, 1.0);

        let image = transform.renditions(MediaType::Image);
        assert_eq!(image.len(), 4);
        assert_eq!(image[0].variant_type, VariantType::Converted);
        assert_eq!(image[0].size, "");
        assert_eq!(image[0].quality, Some(85));
        let sizes: Vec<&str> = image[1..].iter().map(|s| s.size.as_str()).collect();
        assert_eq!(sizes, vec!["small", "medium", "large"]);

        let video = transform.renditions(MediaType::Video);
        assert_eq!(video.len(), 1);
        assert_eq!(video[0].size, "large");
        assert_eq!(video[0].format, "jpeg");

        assert!(transform.renditions(MediaType::Audio).is_empty());
        assert!(transform.renditions(MediaType::Other).is_empty());
    }

    #[tokio::test]
    async fn test_video_without_ffmpeg_fails_processing() {
        let transform = DefaultMediaTransform::new(85, None, 1.0);
        let spec = video_renditions(85).remove(0);

        let err = transform
            .render(&media(MediaType::Video), Bytes::from_static(b"vid"), &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Processing(_)));
    }

    #[tokio::test]
    async fn test_extractor_dispatches_by_type() {
        let extractor = DefaultMetadataExtractor::new(None);

        let image = extractor
            .extract(MediaType::Image, Bytes::from(fixtures::png(30, 20)))
            .await
            .unwrap();
        assert_eq!(image.width, Some(30));
        assert_eq!(image.height, Some(20));
        assert_eq!(image.duration, None);

        let audio = extractor
            .extract(MediaType::Audio, Bytes::from_static(b"mp3"))
            .await
            .unwrap();
        assert_eq!(audio, ExtractedMetadata::default());

        let err = extractor
            .extract(MediaType::Video, Bytes::from_static(b"vid"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_normalize_is_webp() {
        let transform = DefaultMediaTransform::new(85, None, 1.0);
        let rendition = transform
            .normalize(Bytes::from(fixtures::png(5, 5)))
            .await
            .unwrap();
        assert_eq!(rendition.content_type, "image/webp");
    }
}
