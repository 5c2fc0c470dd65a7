use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use medialife_core::AppError;
use std::io::Cursor;

use crate::traits::{Rendition, RenditionSpec};

/// Resizes and re-encodes still images
#[derive(Debug, Clone, Copy)]
pub struct ImageTransform {
    default_quality: u8,
}

impl ImageTransform {
    pub fn new(default_quality: u8) -> Self {
        Self {
            default_quality: default_quality.clamp(1, 100),
        }
    }

    /// Render one rendition. Images already inside the bounding box are not upscaled.
    #[tracing::instrument(skip(self, source, spec), fields(
        variant.type = %spec.variant_type,
        variant.size = %spec.size,
        variant.format = %spec.format
    ))]
    pub async fn render(&self, source: Bytes, spec: &RenditionSpec) -> Result<Rendition, AppError> {
        let spec = spec.clone();
        let quality = spec.quality.unwrap_or(self.default_quality);

        tokio::task::spawn_blocking(move || {
            let (img, _) = super::decode(&source)?;
            let img = fit_within(img, spec.max_width, spec.max_height);
            let (width, height) = img.dimensions();
            let (data, content_type, quality) = encode(&img, &spec.format, quality)?;
            Ok::<_, anyhow::Error>(Rendition {
                data,
                format: spec.format.clone(),
                content_type: content_type.to_string(),
                width: Some(width),
                height: Some(height),
                quality,
            })
        })
        .await
        .map_err(|e| AppError::Internal(format!("Image render task failed: {}", e)))?
        .map_err(|e| AppError::Processing(format!("Failed to render image: {}", e)))
    }

    /// Canonical encoding for streamed uploads: lossless WebP at the source dimensions.
    pub async fn normalize(&self, source: Bytes) -> Result<Rendition, AppError> {
        self.render(source, &RenditionSpec::converted("webp", None))
            .await
    }
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self::new(medialife_core::constants::DEFAULT_IMAGE_QUALITY)
    }
}

fn fit_within(img: DynamicImage, max_width: Option<u32>, max_height: Option<u32>) -> DynamicImage {
    let (width, height) = img.dimensions();
    let box_width = max_width.unwrap_or(width);
    let box_height = max_height.unwrap_or(height);

    if width <= box_width && height <= box_height {
        return img;
    }
    img.thumbnail(box_width, box_height)
}

/// Returns the encoded bytes, their content type and the quality actually applied.
fn encode(
    img: &DynamicImage,
    format: &str,
    quality: u8,
) -> Result<(Bytes, &'static str, Option<u8>), anyhow::Error> {
    let (width, height) = img.dimensions();
    let mut buffer = Vec::with_capacity(width as usize * height as usize / 2);

    match format {
        "jpeg" | "jpg" => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
            Ok((Bytes::from(buffer), "image/jpeg", Some(quality)))
        }
        "webp" => {
            let encoder = WebPEncoder::new_lossless(&mut buffer);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
            Ok((Bytes::from(buffer), "image/webp", None))
        }
        "png" => {
            img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
            Ok((Bytes::from(buffer), "image/png", None))
        }
        other => Err(anyhow::anyhow!("Unsupported output format: {}", other)),
    }
}
