use bytes::Bytes;
use image::GenericImageView;
use medialife_core::AppError;

use crate::metadata::ImageMetadata;

/// Reads dimensions and format from still images
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageMetadataExtractor;

impl ImageMetadataExtractor {
    /// Decoding happens on the blocking pool.
    #[tracing::instrument(skip(self, data), fields(media.size = data.len()))]
    pub async fn extract(&self, data: Bytes) -> Result<ImageMetadata, AppError> {
        let metadata = tokio::task::spawn_blocking(move || {
            let (img, format) = super::decode(&data)?;
            let (width, height) = img.dimensions();
            Ok::<_, anyhow::Error>(ImageMetadata {
                width,
                height,
                format: super::format_name(format),
            })
        })
        .await
        .map_err(|e| AppError::Internal(format!("Image decode task failed: {}", e)))?
        .map_err(|e| AppError::Extraction(format!("Failed to read image: {}", e)))?;

        tracing::debug!(
            width = metadata.width,
            height = metadata.height,
            format = %metadata.format,
            "Image metadata extracted"
        );

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::fixtures;

    #[tokio::test]
    async fn test_extract_metadata() {
        let data = Bytes::from(fixtures::png(100, 40));
        let metadata = ImageMetadataExtractor.extract(data).await.unwrap();

        assert_eq!(metadata.width, 100);
        assert_eq!(metadata.height, 40);
        assert_eq!(metadata.format, "png");
    }

    #[tokio::test]
    async fn test_extract_metadata_invalid_image() {
        let result = ImageMetadataExtractor
            .extract(Bytes::from_static(b"not an image"))
            .await;
        assert!(matches!(result, Err(AppError::Extraction(_))));
    }
}
