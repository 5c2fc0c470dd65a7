use crate::error::AppError;
use crate::models::Media;

/// Returns `Unauthorized` unless `actor` is the identity that uploaded `media`.
///
/// Called before any mutation so a mismatch never leaves partial state behind.
pub fn ensure_owner(media: &Media, actor: &str) -> Result<(), AppError> {
    if media.created_by == actor {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "User {} is not allowed to modify media {}",
            actor, media.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, ProcessingStatus};
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn media(owner: &str) -> Media {
        let now = Utc::now();
        Media {
            id: Uuid::new_v4(),
            created_by: owner.to_string(),
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
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_owner_passes() {
        assert!(ensure_owner(&media("u1"), "u1").is_ok());
    }

    #[test]
    fn test_other_identity_is_unauthorized() {
        let err = ensure_owner(&media("u1"), "u2").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_comparison_is_exact() {
        assert!(ensure_owner(&media("u1"), "U1").is_err());
        assert!(ensure_owner(&media("u1"), "u1 ").is_err());
    }
}
