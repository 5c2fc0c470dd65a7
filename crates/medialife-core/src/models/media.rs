use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::status::ProcessingStatus;
use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::error::AppError;

/// Media type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaType {
    /// Derives the type from the primary component of a MIME type (`image/png` -> `Image`).
    pub fn from_mime(mime_type: &str) -> Self {
        let primary = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match primary.as_str() {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            _ => MediaType::Other,
        }
    }

    /// Images and videos get renditions; everything else completes immediately.
    pub fn needs_processing(&self) -> bool {
        matches!(self, MediaType::Image | MediaType::Video)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "other" => Ok(MediaType::Other),
            other => Err(AppError::InvalidInput(format!(
                "Unknown media type: {}",
                other
            ))),
        }
    }
}

/// One row per logical uploaded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: Uuid,
    pub created_by: String,
    pub name: String,
    /// Bytes actually written to the blob store.
    pub size: i64,
    pub url: String,
    pub storage_key: String,
    pub mime_type: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<f64>,
    pub processing_status: ProcessingStatus,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied changes to a media record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaPatch {
    pub name: Option<String>,
    /// Merged key by key; an empty value deletes the key.
    pub metadata: Option<HashMap<String, String>>,
}

impl MediaPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::InvalidInput("Name cannot be empty".to_string()));
            }
        }
        if let Some(metadata) = &self.metadata {
            if metadata.keys().any(|k| k.trim().is_empty()) {
                return Err(AppError::InvalidInput(
                    "Metadata keys cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn apply(&self, media: &mut Media, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            media.name = name.clone();
        }
        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                if value.is_empty() {
                    media.metadata.remove(key);
                } else {
                    media.metadata.insert(key.clone(), value.clone());
                }
            }
        }
        media.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Name,
    Size,
    UpdatedAt,
}

impl SortField {
    /// Column name interpolated into ORDER BY; only ever one of these literals.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Name => "name",
            SortField::Size => "size",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "createdAt" | "created_at" => Ok(SortField::CreatedAt),
            "name" => Ok(SortField::Name),
            "size" => Ok(SortField::Size),
            "updatedAt" | "updated_at" => Ok(SortField::UpdatedAt),
            other => Err(AppError::InvalidInput(format!(
                "Invalid sort field: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "desc" => Ok(SortOrder::Desc),
            "asc" => Ok(SortOrder::Asc),
            other => Err(AppError::InvalidInput(format!(
                "Invalid sort order: {}",
                other
            ))),
        }
    }
}

/// Raw listing parameters as received from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilters {
    pub created_by: Option<String>,
    pub media_type: Option<MediaType>,
    pub mime_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub sort_by: String,
    pub sort_order: String,
}

impl ListFilters {
    /// Clamps pagination and resolves the sort keys. Unknown sort keys are rejected.
    pub fn normalize(&self) -> Result<ListQuery, AppError> {
        let sort_by = self.sort_by.parse::<SortField>()?;
        let sort_order = self.sort_order.parse::<SortOrder>()?;

        let limit = if self.limit <= 0 {
            DEFAULT_LIST_LIMIT
        } else {
            self.limit.min(MAX_LIST_LIMIT)
        };

        Ok(ListQuery {
            created_by: non_blank(&self.created_by),
            media_type: self.media_type,
            mime_type: non_blank(&self.mime_type),
            limit,
            offset: self.offset.max(0),
            sort_by,
            sort_order,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalized listing query handed to a `MediaStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub created_by: Option<String>,
    pub media_type: Option<MediaType>,
    pub mime_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            created_by: None,
            media_type: None,
            mime_type: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl ListQuery {
    pub fn matches(&self, media: &Media) -> bool {
        self.created_by
            .as_deref()
            .is_none_or(|c| media.created_by == c)
            && self.media_type.is_none_or(|t| media.media_type == t)
            && self
                .mime_type
                .as_deref()
                .is_none_or(|m| media.mime_type == m)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPage {
    pub items: Vec<Media>,
    /// Rows matching the filters, ignoring pagination.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Media {
        let now = Utc::now();
        Media {
            id: Uuid::from_u128(1),
            created_by: "u1".to_string(),
            name: "a.png".to_string(),
            size: 3,
            url: "memory://media/a.png".to_string(),
            storage_key: "media/a.png".to_string(),
            mime_type: "image/png".to_string(),
            media_type: MediaType::Image,
            width: None,
            height: None,
            duration: None,
            processing_status: ProcessingStatus::Pending,
            metadata: HashMap::from([
                ("tag".to_string(), "foo".to_string()),
                ("album".to_string(), "summer".to_string()),
            ]),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/png"), MediaType::Image);
        assert_eq!(MediaType::from_mime("Video/MP4"), MediaType::Video);
        assert_eq!(MediaType::from_mime("audio/mpeg"), MediaType::Audio);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Other);
        assert_eq!(MediaType::from_mime(""), MediaType::Other);
    }

    #[test]
    fn test_needs_processing() {
        assert!(MediaType::Image.needs_processing());
        assert!(MediaType::Video.needs_processing());
        assert!(!MediaType::Audio.needs_processing());
        assert!(!MediaType::Other.needs_processing());
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        let mut filters = ListFilters::default();
        assert_eq!(filters.normalize().unwrap().limit, 20);

        filters.limit = -3;
        assert_eq!(filters.normalize().unwrap().limit, 20);

        filters.limit = 500;
        assert_eq!(filters.normalize().unwrap().limit, 100);

        filters.limit = 42;
        filters.offset = -5;
        let query = filters.normalize().unwrap();
        assert_eq!(query.limit, 42);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_sort_defaults() {
        let query = ListFilters::default().normalize().unwrap();
        assert_eq!(query.sort_by, SortField::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_sort_field_accepts_both_spellings() {
        for (raw, expected) in [
            ("createdAt", SortField::CreatedAt),
            ("created_at", SortField::CreatedAt),
            ("updatedAt", SortField::UpdatedAt),
            ("updated_at", SortField::UpdatedAt),
            ("name", SortField::Name),
            ("size", SortField::Size),
        ] {
            assert_eq!(raw.parse::<SortField>().unwrap(), expected);
        }
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
    }

    #[test]
    fn test_unknown_sort_keys_are_rejected() {
        let filters = ListFilters {
            sort_by: "dropdatabase".to_string(),
            ..ListFilters::default()
        };
        assert!(matches!(
            filters.normalize(),
            Err(AppError::InvalidInput(_))
        ));

        let filters = ListFilters {
            sort_order: "sideways".to_string(),
            ..ListFilters::default()
        };
        assert!(matches!(
            filters.normalize(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_patch_empty_value_removes_key() {
        let mut media = sample();
        let patch = MediaPatch {
            name: None,
            metadata: Some(HashMap::from([("tag".to_string(), String::new())])),
        };
        patch.apply(&mut media, Utc::now());
        assert!(!media.metadata.contains_key("tag"));
        assert_eq!(media.metadata.get("album").map(String::as_str), Some("summer"));
    }

    #[test]
    fn test_patch_sets_value_and_replaces_name() {
        let mut media = sample();
        let before = media.updated_at;
        let patch = MediaPatch {
            name: Some("renamed.png".to_string()),
            metadata: Some(HashMap::from([("tag".to_string(), "bar".to_string())])),
        };
        patch.apply(&mut media, before + chrono::Duration::seconds(1));
        assert_eq!(media.name, "renamed.png");
        assert_eq!(media.metadata.get("tag").map(String::as_str), Some("bar"));
        assert_eq!(media.metadata.len(), 2);
        assert!(media.updated_at > before);
    }

    #[test]
    fn test_patch_validation() {
        let patch = MediaPatch {
            name: Some("  ".to_string()),
            metadata: None,
        };
        assert!(patch.validate().is_err());

        let patch = MediaPatch {
            name: None,
            metadata: Some(HashMap::from([("".to_string(), "x".to_string())])),
        };
        assert!(patch.validate().is_err());

        assert!(MediaPatch::default().validate().is_ok());
    }

    #[test]
    fn test_media_serializes_type_field() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["processingStatus"], "pending");
        assert_eq!(json["createdBy"], "u1");
    }

    #[test]
    fn test_query_matches_filters() {
        let media = sample();
        let query = ListQuery {
            created_by: Some("u1".to_string()),
            media_type: Some(MediaType::Image),
            ..ListQuery::default()
        };
        assert!(query.matches(&media));

        let query = ListQuery {
            mime_type: Some("image/jpeg".to_string()),
            ..ListQuery::default()
        };
        assert!(!query.matches(&media));
    }
}
