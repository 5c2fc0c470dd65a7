//! Service-wide constants and defaults.

/// Name reported in logs when `SERVICE_NAME` is not set.
pub const SERVICE_NAME: &str = "media-service";

/// Default upload limit (100 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// JPEG quality used for converted variants and thumbnails.
pub const DEFAULT_IMAGE_QUALITY: u8 = 85;

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

/// Copy buffer used when draining a streamed upload into the scratch file.
pub const STREAM_BUFFER_SIZE: usize = 32 * 1024;

/// Content types accepted by batch upload unless `ALLOWED_CONTENT_TYPES` overrides them.
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
    "video/quicktime",
    "video/x-msvideo",
];

/// Thumbnail size classes and their bounding boxes.
pub const THUMBNAIL_SIZES: &[(&str, u32, u32)] = &[
    ("small", 150, 150),
    ("medium", 300, 300),
    ("large", 600, 600),
];

/// Queue job names.
pub const JOB_MEDIA_PROCESS: &str = "media:process";
pub const JOB_MEDIA_CLEANUP: &str = "media:cleanup";
