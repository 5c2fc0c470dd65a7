use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medialife_core::models::{ListQuery, Media, ProcessingStatus};
use medialife_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::store::MediaStore;

/// Postgres-backed media repository
#[derive(Clone)]
pub struct PgMediaStore {
    pool: PgPool,
}

impl PgMediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// WHERE clause for a listing query. Placeholders start at `$1`; returns the clause and the
    /// next free placeholder index. Values are bound by `bind_filters!` in the same order.
    fn where_clause(query: &ListQuery) -> (String, usize) {
        let mut where_parts: Vec<String> = Vec::new();
        let mut param_index = 1;

        if query.created_by.is_some() {
            where_parts.push(format!("created_by = ${}", param_index));
            param_index += 1;
        }
        if query.media_type.is_some() {
            where_parts.push(format!("media_type = ${}", param_index));
            param_index += 1;
        }
        if query.mime_type.is_some() {
            where_parts.push(format!("mime_type = ${}", param_index));
            param_index += 1;
        }

        let clause = if where_parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_parts.join(" AND "))
        };
        (clause, param_index)
    }
}

macro_rules! bind_filters {
    ($q:expr, $query:expr) => {{
        let mut q = $q;
        if let Some(ref created_by) = $query.created_by {
            q = q.bind(created_by.clone());
        }
        if let Some(media_type) = $query.media_type {
            q = q.bind(media_type);
        }
        if let Some(ref mime_type) = $query.mime_type {
            q = q.bind(mime_type.clone());
        }
        q
    }};
}

#[async_trait]
impl MediaStore for PgMediaStore {
    #[tracing::instrument(skip(self, media), fields(db.table = "media", db.operation = "insert", db.record_id = %media.id))]
    async fn create_media(&self, media: &Media) -> Result<Media, AppError> {
        let row = sqlx::query_as::<Postgres, Media>(
            r#"
            INSERT INTO media (
                id, created_by, name, size, url, storage_key, mime_type, media_type,
                width, height, duration, processing_status, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(media.id)
        .bind(&media.created_by)
        .bind(&media.name)
        .bind(media.size)
        .bind(&media.url)
        .bind(&media.storage_key)
        .bind(&media.mime_type)
        .bind(media.media_type)
        .bind(media.width)
        .bind(media.height)
        .bind(media.duration)
        .bind(media.processing_status)
        .bind(Json(&media.metadata))
        .bind(media.created_at)
        .bind(media.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select", db.record_id = %id))]
    async fn get_media(&self, id: Uuid) -> Result<Option<Media>, AppError> {
        let row = sqlx::query_as::<Postgres, Media>("SELECT * FROM media WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn list_media(&self, query: &ListQuery) -> Result<(Vec<Media>, i64), AppError> {
        let (where_clause, param_index) = Self::where_clause(query);

        let count_sql = format!("SELECT COUNT(*) FROM media {}", where_clause);
        let count_query = sqlx::query_scalar::<Postgres, i64>(&count_sql);
        let total = bind_filters!(count_query, query)
            .fetch_one(&self.pool)
            .await?;

        // Sort column and direction come from closed enums, never from caller text.
        let select_sql = format!(
            "SELECT * FROM media {} ORDER BY {} {}, id {} LIMIT ${} OFFSET ${}",
            where_clause,
            query.sort_by.column(),
            query.sort_order.sql(),
            query.sort_order.sql(),
            param_index,
            param_index + 1
        );
        let select_query = sqlx::query_as::<Postgres, Media>(&select_sql);
        let rows = bind_filters!(select_query, query)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    #[tracing::instrument(skip(self, media), fields(db.table = "media", db.operation = "update", db.record_id = %media.id))]
    async fn update_media(&self, media: &Media) -> Result<Media, AppError> {
        let row = sqlx::query_as::<Postgres, Media>(
            r#"
            UPDATE media
            SET name = $2, metadata = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(media.id)
        .bind(&media.name)
        .bind(Json(&media.metadata))
        .bind(media.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Media {} not found", media.id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "update", db.record_id = %id))]
    async fn update_processing_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Media, AppError> {
        let row = sqlx::query_as::<Postgres, Media>(
            "UPDATE media SET processing_status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete", db.record_id = %id))]
    async fn delete_media(&self, id: Uuid) -> Result<bool, AppError> {
        // media_variants rows go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn list_pending_processing(
        &self,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Media>, AppError> {
        let rows = sqlx::query_as::<Postgres, Media>(
            r#"
            SELECT * FROM media
            WHERE processing_status = 'pending'
               OR (processing_status = 'processing' AND updated_at < $1)
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(stale_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medialife_core::models::{MediaType, SortField, SortOrder};

    #[test]
    fn test_where_clause_without_filters() {
        let (clause, next) = PgMediaStore::where_clause(&ListQuery::default());
        assert_eq!(clause, "");
        assert_eq!(next, 1);
    }

    #[test]
    fn test_where_clause_numbers_placeholders_in_bind_order() {
        let query = ListQuery {
            created_by: Some("u1".to_string()),
            media_type: Some(MediaType::Image),
            mime_type: Some("image/png".to_string()),
            limit: 10,
            offset: 0,
            sort_by: SortField::Name,
            sort_order: SortOrder::Asc,
        };
        let (clause, next) = PgMediaStore::where_clause(&query);
        assert_eq!(
            clause,
            "WHERE created_by = $1 AND media_type = $2 AND mime_type = $3"
        );
        assert_eq!(next, 4);

        let query = ListQuery {
            mime_type: Some("image/png".to_string()),
            ..ListQuery::default()
        };
        let (clause, next) = PgMediaStore::where_clause(&query);
        assert_eq!(clause, "WHERE mime_type = $1");
        assert_eq!(next, 2);
    }
}
