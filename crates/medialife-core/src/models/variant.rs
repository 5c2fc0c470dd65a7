use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "variant_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum VariantType {
    Thumbnail,
    Converted,
}

impl VariantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Thumbnail => "thumbnail",
            VariantType::Converted => "converted",
        }
    }
}

impl Display for VariantType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A derived rendition of a media record.
///
/// At most one variant exists per `(media_id, variant_type, size)`; re-processing skips
/// combinations that already exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MediaVariant {
    pub id: Uuid,
    pub media_id: Uuid,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    /// Size class ("small", "medium", "large"); empty for non-thumbnail variants.
    pub size: String,
    pub format: String,
    pub url: String,
    pub storage_key: String,
    pub file_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub quality: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl MediaVariant {
    /// Whether this variant occupies the given rendition slot.
    pub fn is_slot(&self, variant_type: VariantType, size: &str) -> bool {
        self.variant_type == variant_type && self.size == size
    }
}
