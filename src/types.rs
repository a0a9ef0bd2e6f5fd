//! Core types for channel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::classify::ContentClass;
use crate::status::DownloadStatus;

/// A file attached directly to a message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Direct download URL
    pub url: String,
    /// Filename given by the uploader
    pub filename: String,
}

/// Rich preview attached to a message by the platform
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Link the embed points at
    #[serde(default)]
    pub url: Option<String>,
    /// Preview image
    #[serde(default)]
    pub image_url: Option<String>,
    /// Preview video
    #[serde(default)]
    pub video_url: Option<String>,
}

/// A chat message as delivered by the messaging platform
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Platform message id (also the history pagination cursor)
    pub id: String,
    /// Channel the message was posted in
    pub channel_id: String,
    /// Guild (server) the channel belongs to
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Author user id
    pub author_id: String,
    /// Free text
    #[serde(default)]
    pub content: String,
    /// When the message was posted
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// When the message was last edited
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    /// Uploaded files
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Link previews
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

impl Message {
    /// Posting time, or now when the platform did not supply one
    pub fn time_or_now(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// A candidate download produced by the resolver
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    /// URL to fetch; identity of the item
    pub link: String,
    /// Preferred filename, if the source or a plugin supplied one
    pub filename: Option<String>,
    /// Time the file is stamped with on disk
    pub timestamp: DateTime<Utc>,
}

/// How a history crawl ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// Every page was processed
    Completed,
    /// A cancel request stopped the crawl
    Cancelled,
    /// Fetching a page failed
    ErrorAborted,
}

/// Event emitted by the downloader
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A file was written and recorded
    FileSaved {
        /// Channel the link came from
        channel_id: String,
        /// Fetched URL
        url: String,
        /// Where the file was written
        path: PathBuf,
        /// Class used for foldering
        class: ContentClass,
    },

    /// A policy skipped a link
    DownloadSkipped {
        /// Channel the link came from
        channel_id: String,
        /// Skipped URL
        url: String,
        /// Skip status
        status: DownloadStatus,
    },

    /// A link still failed after every retry
    DownloadFailed {
        /// Channel the link came from
        channel_id: String,
        /// Failed URL
        url: String,
        /// Final status
        status: DownloadStatus,
        /// Last underlying error
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Number of attempts made
        attempts: u32,
    },

    /// A history crawl began
    HistoryStarted {
        /// Channel being crawled
        channel_id: String,
    },

    /// A history crawl is about to request another page
    HistoryProgress {
        /// Channel being crawled
        channel_id: String,
        /// Files saved so far
        saved: u64,
        /// Time since the crawl started
        elapsed: Duration,
    },

    /// A history crawl ended
    HistoryFinished {
        /// Channel that was crawled
        channel_id: String,
        /// How it ended
        outcome: CrawlOutcome,
        /// Files saved
        saved: u64,
        /// Total crawl time
        elapsed: Duration,
    },
}
