use async_trait::async_trait;
use medialife_core::models::{MediaVariant, VariantType};
use medialife_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::store::VariantStore;

/// Postgres-backed variant repository
#[derive(Clone)]
pub struct PgVariantStore {
    pool: PgPool,
}

impl PgVariantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[async_trait]
impl VariantStore for PgVariantStore {
    #[tracing::instrument(skip(self, variant), fields(db.table = "media_variants", db.operation = "insert", db.record_id = %variant.id))]
    async fn create_variant(
        &self,
        variant: &MediaVariant,
    ) -> Result<Option<MediaVariant>, AppError> {
        let result = sqlx::query_as::<Postgres, MediaVariant>(
            r#"
            INSERT INTO media_variants (
                id, media_id, variant_type, size, format, url, storage_key,
                file_size, width, height, quality, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (media_id, variant_type, size) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(variant.id)
        .bind(variant.media_id)
        .bind(variant.variant_type)
        .bind(&variant.size)
        .bind(&variant.format)
        .bind(&variant.url)
        .bind(&variant.storage_key)
        .bind(variant.file_size)
        .bind(variant.width)
        .bind(variant.height)
        .bind(variant.quality)
        .bind(variant.created_at)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(e) if is_foreign_key_violation(&e) => Err(AppError::NotFound(format!(
                "Media {} not found",
                variant.media_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_variants", db.operation = "select", db.record_id = %media_id))]
    async fn list_variants_by_media(&self, media_id: Uuid) -> Result<Vec<MediaVariant>, AppError> {
        let rows = sqlx::query_as::<Postgres, MediaVariant>(
            "SELECT * FROM media_variants WHERE media_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(media_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_variants", db.operation = "select", db.record_id = %id))]
    async fn get_variant(&self, id: Uuid) -> Result<Option<MediaVariant>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaVariant>(
            "SELECT * FROM media_variants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_variants", db.operation = "select", db.record_id = %media_id))]
    async fn get_variant_by_media_type_size(
        &self,
        media_id: Uuid,
        variant_type: VariantType,
        size: &str,
    ) -> Result<Option<MediaVariant>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaVariant>(
            r#"
            SELECT * FROM media_variants
            WHERE media_id = $1 AND variant_type = $2 AND size = $3
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(media_id)
        .bind(variant_type)
        .bind(size)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_variants", db.operation = "delete", db.record_id = %id))]
    async fn delete_variant(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM media_variants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_variants", db.operation = "delete", db.record_id = %media_id))]
    async fn delete_variants_by_media(&self, media_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM media_variants WHERE media_id = $1")
            .bind(media_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
