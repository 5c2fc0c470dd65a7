//! Metadata types produced by the extractors

use serde::{Deserialize, Serialize};

/// Image metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Video metadata as reported by ffprobe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

/// What the lifecycle core records on a media row. Absent fields mean "not applicable or
/// undetermined".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<f64>,
    pub format: Option<String>,
}

impl ExtractedMetadata {
    pub fn width_i32(&self) -> Option<i32> {
        self.width.and_then(|w| i32::try_from(w).ok())
    }

    pub fn height_i32(&self) -> Option<i32> {
        self.height.and_then(|h| i32::try_from(h).ok())
    }
}

impl From<ImageMetadata> for ExtractedMetadata {
    fn from(m: ImageMetadata) -> Self {
        Self {
            width: Some(m.width),
            height: Some(m.height),
            duration: None,
            format: Some(m.format),
        }
    }
}

impl From<VideoMetadata> for ExtractedMetadata {
    fn from(m: VideoMetadata) -> Self {
        Self {
            width: Some(m.width),
            height: Some(m.height),
            duration: Some(m.duration),
            format: Some(m.codec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_video_metadata_keeps_duration() {
        let extracted = ExtractedMetadata::from(VideoMetadata {
            duration: 12.5,
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
        });
        assert_eq!(extracted.duration, Some(12.5));
        assert_eq!(extracted.width_i32(), Some(1920));
        assert_eq!(extracted.format.as_deref(), Some("h264"));
    }

    #[test]
    fn test_oversized_dimensions_do_not_fit_i32() {
        let extracted = ExtractedMetadata {
            width: Some(u32::MAX),
            ..ExtractedMetadata::default()
        };
        assert_eq!(extracted.width_i32(), None);
    }
}
