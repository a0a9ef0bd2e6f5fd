//! Download record operations.

use crate::{Error, Result};

use super::{Database, DownloadRecord, RecordRow};

impl Database {
    /// Insert a download record
    ///
    /// Called after a file has been written; the row id is returned.
    pub async fn insert_record(&self, record: &DownloadRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO downloads (
                url, downloaded_at, destination, filename, channel_id, user_id
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.url)
        .bind(record.downloaded_at.timestamp())
        .bind(record.destination.to_string_lossy().into_owned())
        .bind(&record.filename)
        .bind(&record.channel_id)
        .bind(&record.user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// Every record with exactly this source URL, oldest first
    pub async fn find_records_by_url(&self, url: &str) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT url, downloaded_at, destination, filename, channel_id, user_id
            FROM downloads
            WHERE url = ?
            ORDER BY id ASC
            "#,
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(DownloadRecord::from).collect())
    }
}
