//! Seam to the chat platform.
//!
//! The pipeline never talks to a platform SDK directly. It posts and edits
//! [`Notice`]s and pages through channel history through a [`Messenger`]
//! implementation supplied by the embedding application.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Message;

/// Titled status text shown to users (rendered as an embed by most platforms)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Heading
    pub title: String,
    /// Body text
    pub content: String,
}

impl Notice {
    /// Build a notice
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Handle to a message the bot has posted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    /// Platform message id
    pub id: String,
    /// Channel it was posted in
    pub channel_id: String,
}

/// Chat platform operations used by the pipeline
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post a notice, optionally mentioning a user
    async fn send_notice(
        &self,
        channel_id: &str,
        notice: &Notice,
        mention_user_id: Option<&str>,
    ) -> Result<SentMessage>;

    /// Replace the notice in a previously posted message
    async fn edit_notice(&self, message: &SentMessage, notice: &Notice) -> Result<SentMessage>;

    /// Up to `limit` messages older than `before` (newest first); `None` means
    /// start from the most recent message
    async fn channel_messages(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<Message>>;

    /// User id of the bot account, used to ignore its own messages
    fn current_user_id(&self) -> Option<String> {
        None
    }
}
