//! Entry points for live messages.

use crate::config::ChannelPolicy;
use crate::status::Outcome;
use crate::types::{FileItem, Message};

use super::ChannelDownloader;
use super::supervisor::Origin;

/// Phrases that stop a message from being downloaded
pub const SKIP_WORDS: &[&str] = &["skip", "ignore", "don't save", "no save"];

impl ChannelDownloader {
    /// Download everything linked or attached in a newly posted message.
    ///
    /// Messages are ignored when the channel is not registered or disabled, when
    /// the bot wrote them (unless `scan_own_messages`), or when they contain a
    /// skip word and skipping is allowed. Returns every candidate with its final
    /// outcome, in resolution order.
    pub async fn handle_message(&self, message: &Message) -> Vec<(FileItem, Outcome)> {
        let Some(policy) = self.live_policy(message) else {
            return Vec::new();
        };

        if self.skipping_allowed(&policy)
            && SKIP_WORDS.iter().any(|word| message.content.contains(word))
        {
            tracing::info!(message_id = %message.id, "Message skipped by skip word");
            return Vec::new();
        }

        self.download_message(message).await
    }

    /// Download everything in an edited message.
    ///
    /// Only messages with an edit timestamp in channels with `scan_edits` are
    /// considered. A skip word only applies when it is the entire content.
    pub async fn handle_message_update(&self, message: &Message) -> Vec<(FileItem, Outcome)> {
        if message.edited_timestamp.is_none() {
            return Vec::new();
        }
        let Some(policy) = self.live_policy(message) else {
            return Vec::new();
        };
        if !policy.scan_edits {
            return Vec::new();
        }

        if self.skipping_allowed(&policy)
            && SKIP_WORDS.iter().any(|word| message.content == *word)
        {
            tracing::info!(message_id = %message.id, "Edited message skipped by skip word");
            return Vec::new();
        }

        self.download_message(message).await
    }

    /// Policy of the message's channel if the message should be looked at
    fn live_policy(&self, message: &Message) -> Option<ChannelPolicy> {
        if !self.config.download.scan_own_messages
            && let Some(own_id) = self.messenger.current_user_id()
            && own_id == message.author_id
        {
            return None;
        }

        let policy = self.policies.policy(&message.channel_id)?;
        if !policy.enabled {
            tracing::debug!(channel_id = %message.channel_id, "Channel disabled, ignoring message");
            return None;
        }
        Some(policy)
    }

    fn skipping_allowed(&self, policy: &ChannelPolicy) -> bool {
        policy
            .allow_skipping
            .unwrap_or(self.config.download.allow_skipping)
    }

    async fn download_message(&self, message: &Message) -> Vec<(FileItem, Outcome)> {
        tracing::info!(
            channel_id = %message.channel_id,
            author_id = %message.author_id,
            attachments = message.attachments.len(),
            "Message: {}",
            message.content
        );

        let items = self.resolver.resolve(message).await;
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            tracing::info!(url = %item.link, "> FILE");
            let outcome = self.start_download(&item, message, Origin::Live).await;
            results.push((item, outcome));
        }
        results
    }
}
