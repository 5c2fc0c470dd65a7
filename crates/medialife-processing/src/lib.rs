//! medialife processing
//!
//! The two codec-facing capabilities consumed by the lifecycle core:
//! [`MetadataExtractor`] (dimensions and duration) and [`MediaTransform`] (renditions and the
//! canonical encoding used by streaming uploads). Image work uses the `image` crate on the
//! blocking pool; video work shells out to ffprobe/ffmpeg.

pub mod defaults;
pub mod fake;
pub mod image;
pub mod metadata;
pub mod traits;
pub mod validator;
pub mod video;

pub use defaults::{
    image_renditions, video_renditions, DefaultMediaTransform, DefaultMetadataExtractor,
};
pub use fake::{StaticMetadataExtractor, StaticTransform};
pub use self::image::{ImageMetadataExtractor, ImageTransform};
pub use metadata::{ExtractedMetadata, ImageMetadata, VideoMetadata};
pub use traits::{MediaTransform, MetadataExtractor, Rendition, RenditionSpec};
pub use validator::{normalize_mime, UploadValidator, ValidationError};
pub use video::{ffprobe_path_for, VideoProbe, VideoThumbnailer};
