//! Bounded retry around the fetch executor, plus failure reporting.

use crate::messenger::Notice;
use crate::retry::run_with_retry;
use crate::status::{FailureKind, Outcome};
use crate::types::{Event, FileItem, Message};

use super::ChannelDownloader;
use super::fetch::FetchRequest;

/// Title of the notice sent when a download gives up
pub(crate) const FAILURE_NOTICE_TITLE: &str = "Download Failure";

/// Where a download request came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A message that just arrived or was edited
    Live,
    /// A message replayed by a history crawl
    History,
}

impl ChannelDownloader {
    /// Download one item, retrying retryable failures.
    ///
    /// Successes and skips end the loop immediately. When every attempt failed,
    /// a [`Event::DownloadFailed`] is emitted and, for live messages in channels
    /// with `error_messages`, a failure notice mentioning the author is posted.
    pub async fn start_download(&self, item: &FileItem, message: &Message, origin: Origin) -> Outcome {
        let Some(policy) = self.policies.policy(&message.channel_id) else {
            tracing::warn!(
                channel_id = %message.channel_id,
                url = %item.link,
                "Channel is not registered, not downloading"
            );
            return Outcome::failed(FailureKind::Generic);
        };

        let max_attempts = policy
            .retry_attempts
            .unwrap_or(self.config.retry.max_attempts);
        let retry = self.config.retry.with_max_attempts(max_attempts);

        let request = FetchRequest {
            url: item.link.clone(),
            filename: item.filename.clone(),
            destination: policy.destination.clone(),
            channel_id: message.channel_id.clone(),
            user_id: message.author_id.clone(),
            timestamp: item.timestamp,
        };

        let fetcher = &self.fetcher;
        let request_ref = &request;
        let policy_ref = &policy;
        let result = run_with_retry(&retry, |attempt| async move {
            tracing::debug!(url = %request_ref.url, attempt, "Attempting download");
            fetcher.fetch(request_ref, policy_ref).await
        })
        .await;

        let attempts = result.attempts;
        let outcome = result
            .last
            .unwrap_or_else(|| Outcome::failed(FailureKind::Generic));

        if outcome.status.is_retryable() {
            tracing::error!(
                url = %item.link,
                channel_id = %message.channel_id,
                attempts,
                status = %outcome.status,
                error = outcome.error.as_deref().unwrap_or(""),
                "Gave up on downloading"
            );

            self.emit_event(Event::DownloadFailed {
                channel_id: message.channel_id.clone(),
                url: item.link.clone(),
                status: outcome.status,
                error: outcome.error.clone(),
                attempts,
            });

            if origin == Origin::Live && policy.error_messages {
                self.send_failure_notice(item, message, &outcome, attempts)
                    .await;
            }
        }

        outcome
    }

    async fn send_failure_notice(
        &self,
        item: &FileItem,
        message: &Message,
        outcome: &Outcome,
        attempts: u32,
    ) {
        let mut content = format!(
            "Gave up trying to download\n<{}>\nafter {} failed attempts...\n\n``{}``",
            item.link,
            attempts,
            outcome.status.description()
        );
        if let Some(error) = &outcome.error {
            content.push_str(&format!("\n```ERROR: {}```", error));
        }

        let notice = Notice::new(FAILURE_NOTICE_TITLE, content);
        if let Err(e) = self
            .messenger
            .send_notice(&message.channel_id, &notice, Some(&message.author_id))
            .await
        {
            tracing::error!(
                channel_id = %message.channel_id,
                error = %e,
                "Failed to send failure notice"
            );
        }
    }
}
