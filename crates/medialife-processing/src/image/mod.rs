//! Still-image support built on the `image` crate

mod extractor;
mod transform;

pub use extractor::ImageMetadataExtractor;
pub use transform::ImageTransform;

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader};

/// Decode a payload, guessing the format from its magic bytes.
pub(crate) fn decode(data: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>), anyhow::Error> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = reader.format();
    let img = reader.decode()?;
    Ok((img, format))
}

/// Short lowercase name for a detected format (`png`, `jpeg`, ...).
pub(crate) fn format_name(format: Option<ImageFormat>) -> String {
    format
        .and_then(|f| f.extensions_str().first().copied())
        .map(|ext| match ext {
            "jpg" => "jpeg".to_string(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string())
}
