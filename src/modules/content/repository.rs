use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{ContentRecord, MediaStatus, NewContent};

const CONTENT_COLUMNS: &str =
    "id, owner_id, title, description, media_type, object_key, status, created_at, modified_at";

/// Persistence for content records. Every write is a single-row update; the
/// key-changing ones are conditional so a stale caller cannot clobber a newer
/// upload.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create(&self, new: NewContent) -> Result<ContentRecord, sqlx::Error>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentRecord>, sqlx::Error>;

    /// Points the record at a freshly uploaded raw object and returns the key
    /// it replaced. The returned key may be deleted once this call returns.
    async fn commit_raw_key(&self, id: Uuid, raw_key: &str)
    -> Result<Option<String>, sqlx::Error>;

    /// Sets `status` if the record still points at `expected_key`.
    async fn update_status(
        &self,
        id: Uuid,
        expected_key: &str,
        status: MediaStatus,
    ) -> Result<bool, sqlx::Error>;

    /// Swaps `raw_key` for the transcoded `output_key` and marks the record
    /// final. Returns `None` if the record no longer points at `raw_key`.
    async fn commit_final_key(
        &self,
        id: Uuid,
        raw_key: &str,
        output_key: &str,
    ) -> Result<Option<ContentRecord>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentRepository {
    async fn create(&self, new: NewContent) -> Result<ContentRecord, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO contents (owner_id, title, description, media_type, status)
            VALUES ($1, $2, $3, $4, 'draft')
            RETURNING {CONTENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ContentRecord>(&sql)
            .bind(new.owner_id)
            .bind(new.title)
            .bind(new.description)
            .bind(new.media_type)
            .fetch_one(&self.pool)
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentRecord>, sqlx::Error> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = $1");

        sqlx::query_as::<_, ContentRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn commit_raw_key(
        &self,
        id: Uuid,
        raw_key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Row lock so the previous key we hand back is the one we replaced.
        let previous: Option<String> =
            sqlx::query_scalar("SELECT object_key FROM contents WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;

        sqlx::query(
            r#"
            UPDATE contents
            SET object_key = $1, status = 'raw', modified_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(raw_key)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(previous)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_key: &str,
        status: MediaStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contents
            SET status = $1, modified_at = NOW()
            WHERE id = $2 AND object_key = $3
            "#,
        )
        .bind(status)
        .bind(id)
        .bind(expected_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit_final_key(
        &self,
        id: Uuid,
        raw_key: &str,
        output_key: &str,
    ) -> Result<Option<ContentRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE contents
            SET object_key = $1, status = 'final', modified_at = NOW()
            WHERE id = $2 AND object_key = $3
            RETURNING {CONTENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ContentRecord>(&sql)
            .bind(output_key)
            .bind(id)
            .bind(raw_key)
            .fetch_optional(&self.pool)
            .await
    }
}
