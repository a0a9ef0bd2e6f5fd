//! Shared test helpers for creating ChannelDownloader instances in tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::{ChannelPolicy, Config};
use crate::db::{Database, DownloadRecord, RecordStore};
use crate::downloader::ChannelDownloader;
use crate::error::{Error, Result};
use crate::messenger::{Messenger, Notice, SentMessage};
use crate::resolver::Resolver;
use crate::types::{Attachment, Message};

/// Channel registered by [`create_test_downloader`]
pub(crate) const CHANNEL: &str = "chan";
/// Author of messages built by [`message`]
pub(crate) const AUTHOR: &str = "user";

/// Smallest body `infer` recognizes as `image/png`
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R', 0, 0, 0,
    1, 0, 0, 0, 1, 8, 6, 0, 0, 0,
];

/// Binary body without a known signature (sniffed as `application/octet-stream`)
pub(crate) const BINARY_BYTES: &[u8] = b"\x00\x02binary\x01payload\x00";

/// A notice posted through [`FakeMessenger`]
#[derive(Clone, Debug)]
pub(crate) struct SentNotice {
    pub channel_id: String,
    pub notice: Notice,
    pub mention: Option<String>,
}

/// In-memory messaging platform recording everything the downloader does
#[derive(Default)]
pub(crate) struct FakeMessenger {
    /// Channel history, newest first
    pub history: Vec<Message>,
    /// Page requests succeed this many times, then fail
    pub pages_before_failure: Option<usize>,
    /// Every edit fails
    pub fail_edits: bool,
    /// Id reported by `current_user_id`
    pub own_id: Option<String>,
    pub page_requests: Mutex<Vec<(usize, Option<String>)>>,
    pub sent: Mutex<Vec<SentNotice>>,
    pub edits: Mutex<Vec<(SentMessage, Notice)>>,
}

impl FakeMessenger {
    pub fn with_history(history: Vec<Message>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotice> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_titled(&self, title: &str) -> Vec<SentNotice> {
        self.sent()
            .into_iter()
            .filter(|s| s.notice.title == title)
            .collect()
    }

    pub fn edits(&self) -> Vec<(SentMessage, Notice)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn page_requests(&self) -> Vec<(usize, Option<String>)> {
        self.page_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_notice(
        &self,
        channel_id: &str,
        notice: &Notice,
        mention_user_id: Option<&str>,
    ) -> Result<SentMessage> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentNotice {
            channel_id: channel_id.to_string(),
            notice: notice.clone(),
            mention: mention_user_id.map(str::to_string),
        });
        Ok(SentMessage {
            id: format!("notice-{}", sent.len()),
            channel_id: channel_id.to_string(),
        })
    }

    async fn edit_notice(&self, message: &SentMessage, notice: &Notice) -> Result<SentMessage> {
        if self.fail_edits {
            return Err(Error::Messaging("edit rejected".to_string()));
        }
        self.edits
            .lock()
            .unwrap()
            .push((message.clone(), notice.clone()));
        Ok(message.clone())
    }

    async fn channel_messages(
        &self,
        _channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<Message>> {
        let mut requests = self.page_requests.lock().unwrap();
        requests.push((limit, before.map(str::to_string)));
        if let Some(allowed) = self.pages_before_failure
            && requests.len() > allowed
        {
            return Err(Error::Messaging("503 Service Unavailable".to_string()));
        }

        let start = match before {
            None => 0,
            Some(id) => match self.history.iter().position(|m| m.id == id) {
                Some(index) => index + 1,
                None => self.history.len(),
            },
        };
        Ok(self.history.iter().skip(start).take(limit).cloned().collect())
    }

    fn current_user_id(&self) -> Option<String> {
        self.own_id.clone()
    }
}

/// Record store whose inserts always fail
pub(crate) struct FailingRecords;

#[async_trait]
impl RecordStore for FailingRecords {
    async fn insert(&self, _record: &DownloadRecord) -> Result<i64> {
        Err(Error::Other("disk full".to_string()))
    }

    async fn find_by_url(&self, _url: &str) -> Result<Vec<DownloadRecord>> {
        Ok(Vec::new())
    }
}

/// Downloader wired to fakes, plus handles for inspecting what it did
pub(crate) struct TestDownloader {
    pub downloader: ChannelDownloader,
    pub messenger: Arc<FakeMessenger>,
    pub db: Arc<Database>,
    pub temp_dir: TempDir,
}

impl TestDownloader {
    /// Destination root of the test channel
    pub fn destination(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("downloads")
    }
}

/// Fast-retry config with no filename date prefix and one registered channel
pub(crate) fn test_config(temp_dir: &TempDir, policy: ChannelPolicy) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.download.filename_date_format = String::new();
    config.download.timeout = Duration::from_secs(5);
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(10);
    config.with_channel(CHANNEL, policy)
}

/// Helper to create a test ChannelDownloader with a persistent database.
/// `customize` adjusts the channel policy before the downloader is built.
pub(crate) async fn create_test_downloader(
    messenger: FakeMessenger,
    customize: impl FnOnce(&mut ChannelPolicy),
) -> TestDownloader {
    create_test_downloader_with_resolver(messenger, Resolver::new(), customize).await
}

pub(crate) async fn create_test_downloader_with_resolver(
    messenger: FakeMessenger,
    resolver: Resolver,
    customize: impl FnOnce(&mut ChannelPolicy),
) -> TestDownloader {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut policy = ChannelPolicy::new(temp_dir.path().join("downloads"));
    customize(&mut policy);
    let config = Arc::new(test_config(&temp_dir, policy));

    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .unwrap(),
    );
    let messenger = Arc::new(messenger);

    let downloader = ChannelDownloader::from_parts(
        config.clone(),
        config,
        db.clone(),
        messenger.clone(),
        resolver,
    )
    .unwrap();

    TestDownloader {
        downloader,
        messenger,
        db,
        temp_dir,
    }
}

/// Message in the test channel by the test author
pub(crate) fn message(id: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        channel_id: CHANNEL.to_string(),
        author_id: AUTHOR.to_string(),
        content: content.to_string(),
        ..Default::default()
    }
}

/// Message carrying a single attachment
pub(crate) fn attachment_message(id: &str, url: &str, filename: &str) -> Message {
    let mut message = message(id, "");
    message.attachments.push(Attachment {
        url: url.to_string(),
        filename: filename.to_string(),
    });
    message
}
