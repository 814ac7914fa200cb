//! Download record repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{ContentDownloadRecord, ContentId};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::types::Json;
use sqlx::{query, query_as, SqlitePool};
use tracing::{debug, instrument};

/// Download record data access.
#[async_trait]
pub trait DownloadRepository: Send + Sync {
    /// Find a record by content id
    ///
    /// # Returns
    /// - `Ok(Some(record))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: &ContentId) -> Result<Option<ContentDownloadRecord>>;

    /// Insert a record, or replace every column except `created_at` if one
    /// with the same id exists.
    async fn upsert(&self, record: &ContentDownloadRecord) -> Result<()>;

    /// Flag a record as downloaded and attach its artifact details.
    ///
    /// # Errors
    /// `NotFound` if no record exists for `id`.
    async fn mark_downloaded(
        &self,
        id: &ContentId,
        encrypted_file_path: &str,
        content_hash: Option<&str>,
        total_bytes: i64,
        downloaded_at: i64,
    ) -> Result<()>;

    /// Delete a record by id
    ///
    /// # Returns
    /// - `Ok(true)` if a record was deleted
    /// - `Ok(false)` if none existed
    async fn delete(&self, id: &ContentId) -> Result<bool>;

    /// All records, oldest first.
    async fn find_all(&self) -> Result<Vec<ContentDownloadRecord>>;

    async fn count(&self) -> Result<i64>;

    /// Lazily stream every record, oldest first.
    ///
    /// Rows are pulled from the database as the stream is polled. Each call
    /// starts a fresh query.
    fn stream_all(&self) -> BoxStream<'_, Result<ContentDownloadRecord>>;
}

/// SQLite implementation of [`DownloadRepository`]
pub struct SqliteDownloadRepository {
    pool: SqlitePool,
}

impl SqliteDownloadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DownloadRepository for SqliteDownloadRepository {
    async fn find_by_id(&self, id: &ContentId) -> Result<Option<ContentDownloadRecord>> {
        let record =
            query_as::<_, ContentDownloadRecord>("SELECT * FROM content_downloads WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    #[instrument(skip(self, record), fields(content_id = %record.id))]
    async fn upsert(&self, record: &ContentDownloadRecord) -> Result<()> {
        record.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "content_download".to_string(),
            message: msg,
        })?;

        query(
            r#"
            INSERT INTO content_downloads (
                id, content_type, source_url, course_id, course_name,
                course_description, category_name, sub_category_name, subject_name,
                tags, is_free, is_offline_available, encrypted_file_path,
                is_downloaded, downloaded_at, total_bytes, content_hash,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content_type = excluded.content_type,
                source_url = excluded.source_url,
                course_id = excluded.course_id,
                course_name = excluded.course_name,
                course_description = excluded.course_description,
                category_name = excluded.category_name,
                sub_category_name = excluded.sub_category_name,
                subject_name = excluded.subject_name,
                tags = excluded.tags,
                is_free = excluded.is_free,
                is_offline_available = excluded.is_offline_available,
                encrypted_file_path = excluded.encrypted_file_path,
                is_downloaded = excluded.is_downloaded,
                downloaded_at = excluded.downloaded_at,
                total_bytes = excluded.total_bytes,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(record.content_type)
        .bind(&record.source_url)
        .bind(&record.course_id)
        .bind(&record.course_name)
        .bind(&record.course_description)
        .bind(&record.category_name)
        .bind(&record.sub_category_name)
        .bind(&record.subject_name)
        .bind(Json(&record.tags))
        .bind(record.is_free)
        .bind(record.is_offline_available)
        .bind(&record.encrypted_file_path)
        .bind(record.is_downloaded)
        .bind(record.downloaded_at)
        .bind(record.total_bytes)
        .bind(&record.content_hash)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Download record upserted");
        Ok(())
    }

    #[instrument(skip(self, content_hash))]
    async fn mark_downloaded(
        &self,
        id: &ContentId,
        encrypted_file_path: &str,
        content_hash: Option<&str>,
        total_bytes: i64,
        downloaded_at: i64,
    ) -> Result<()> {
        let result = query(
            r#"
            UPDATE content_downloads
            SET encrypted_file_path = ?, content_hash = ?, total_bytes = ?,
                is_downloaded = 1, downloaded_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(encrypted_file_path)
        .bind(content_hash)
        .bind(total_bytes)
        .bind(downloaded_at)
        .bind(downloaded_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "ContentDownload".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: &ContentId) -> Result<bool> {
        let result = query("DELETE FROM content_downloads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_all(&self) -> Result<Vec<ContentDownloadRecord>> {
        let records = query_as::<_, ContentDownloadRecord>(
            "SELECT * FROM content_downloads ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM content_downloads")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    fn stream_all(&self) -> BoxStream<'_, Result<ContentDownloadRecord>> {
        query_as::<_, ContentDownloadRecord>(
            "SELECT * FROM content_downloads ORDER BY created_at ASC, id ASC",
        )
        .fetch(&self.pool)
        .map_err(LibraryError::from)
        .boxed()
    }
}
