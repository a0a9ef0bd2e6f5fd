//! Database layer for channel-dl
//!
//! Handles SQLite persistence of download records: one row per saved file,
//! looked up by source URL to avoid re-downloading during history crawls.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`records`] — Download record insert and lookup

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

use crate::error::Result;

mod migrations;
mod records;

/// A file that was saved, as stored in the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Link the file was requested from (before redirects)
    pub url: String,
    /// When the file was saved
    pub downloaded_at: DateTime<Utc>,
    /// Full path of the written file
    pub destination: PathBuf,
    /// Final filename on disk
    pub filename: String,
    /// Channel the link was posted in
    pub channel_id: String,
    /// User who posted the link
    pub user_id: String,
}

/// Download record row from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub(crate) struct RecordRow {
    /// Source URL
    pub url: String,
    /// Unix timestamp of the download
    pub downloaded_at: i64,
    /// Full path of the written file
    pub destination: String,
    /// Final filename on disk
    pub filename: String,
    /// Channel identifier
    pub channel_id: String,
    /// User identifier
    pub user_id: String,
}

impl From<RecordRow> for DownloadRecord {
    fn from(row: RecordRow) -> Self {
        DownloadRecord {
            url: row.url,
            downloaded_at: Utc
                .timestamp_opt(row.downloaded_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
            destination: PathBuf::from(row.destination),
            filename: row.filename,
            channel_id: row.channel_id,
            user_id: row.user_id,
        }
    }
}

/// Persistent log of saved files
///
/// The fetch executor writes a record after every successful save; the history
/// crawler consults [`RecordStore::find_by_url`] before downloading a link.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a record, returning its row id
    async fn insert(&self, record: &DownloadRecord) -> Result<i64>;

    /// Every record whose source URL is exactly `url`
    async fn find_by_url(&self, url: &str) -> Result<Vec<DownloadRecord>>;
}

/// Database handle for channel-dl
pub struct Database {
    pool: SqlitePool,
}

#[async_trait]
impl RecordStore for Database {
    async fn insert(&self, record: &DownloadRecord) -> Result<i64> {
        self.insert_record(record).await
    }

    async fn find_by_url(&self, url: &str) -> Result<Vec<DownloadRecord>> {
        self.find_records_by_url(url).await
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
