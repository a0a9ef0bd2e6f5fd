//! Channel history backfill.
//!
//! A crawl pages backwards through a channel, newest page first, and replays the
//! download pipeline over every message. Links that already have a download
//! record are not fetched again. Progress is reported by editing one status
//! notice, and a crawl can be cancelled cooperatively between messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::messenger::{Notice, SentMessage};
use crate::resolver::dedup_by_link;
use crate::types::{CrawlOutcome, Event, FileItem, Message};
use crate::utils::{format_elapsed, format_elapsed_short, format_number};

use super::ChannelDownloader;
use super::supervisor::Origin;

/// Messages requested per history page
pub const HISTORY_PAGE_SIZE: usize = 100;

/// Title of every history status notice
pub(crate) const HISTORY_NOTICE_TITLE: &str = "Command — History";

/// State of an active crawl
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrawlState {
    /// Pages are being processed
    Downloading,
    /// A cancel was requested; the crawl stops before its next message
    CancelRequested,
}

/// Registry of active crawls keyed by channel id
///
/// A channel is present from the start of its crawl until the crawl reaches a
/// terminal state.
#[derive(Clone, Debug, Default)]
pub struct HistoryRegistry {
    crawls: Arc<Mutex<HashMap<String, CrawlState>>>,
}

impl HistoryRegistry {
    fn with_crawls<R>(&self, f: impl FnOnce(&mut HashMap<String, CrawlState>) -> R) -> R {
        let mut crawls = self.crawls.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut crawls)
    }

    /// Mark a crawl as started; false if one is already active for the channel
    pub fn begin(&self, channel_id: &str) -> bool {
        self.with_crawls(|crawls| {
            if crawls.contains_key(channel_id) {
                false
            } else {
                crawls.insert(channel_id.to_string(), CrawlState::Downloading);
                true
            }
        })
    }

    /// Ask an active crawl to stop; false if the channel has no active crawl
    pub fn request_cancel(&self, channel_id: &str) -> bool {
        self.with_crawls(|crawls| match crawls.get_mut(channel_id) {
            Some(state) => {
                *state = CrawlState::CancelRequested;
                true
            }
            None => false,
        })
    }

    /// Current state of the channel's crawl, if one is active
    pub fn state(&self, channel_id: &str) -> Option<CrawlState> {
        self.with_crawls(|crawls| crawls.get(channel_id).copied())
    }

    /// Remove the channel's entry
    pub fn finish(&self, channel_id: &str) {
        self.with_crawls(|crawls| {
            crawls.remove(channel_id);
        });
    }

    fn cancel_requested(&self, channel_id: &str) -> bool {
        self.state(channel_id) == Some(CrawlState::CancelRequested)
    }
}

/// Summary of a finished crawl
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlReport {
    /// How the crawl ended
    pub outcome: CrawlOutcome,
    /// Files saved during the crawl
    pub saved: u64,
    /// Pages requested from the messaging platform
    pub pages: u32,
    /// Wall time of the crawl
    pub elapsed: Duration,
}

/// Mutable crawl progress
struct Crawl<'a> {
    channel_id: &'a str,
    started: Instant,
    saved: u64,
    pages: u32,
    status: Option<SentMessage>,
}

impl ChannelDownloader {
    /// Download every file in a channel's history.
    ///
    /// # Errors
    /// [`Error::ChannelNotRegistered`] for channels without a policy and
    /// [`Error::HistoryInProgress`] when the channel is already being crawled.
    /// Problems during the crawl end it with a [`CrawlOutcome`] instead.
    pub async fn crawl_history(&self, channel_id: &str) -> Result<CrawlReport> {
        if !self.policies.is_registered(channel_id) {
            return Err(Error::ChannelNotRegistered(channel_id.to_string()));
        }
        if !self.history.begin(channel_id) {
            return Err(Error::HistoryInProgress(channel_id.to_string()));
        }

        tracing::info!(channel_id = %channel_id, "Starting history crawl");
        self.emit_event(Event::HistoryStarted {
            channel_id: channel_id.to_string(),
        });

        let mut crawl = Crawl {
            channel_id,
            started: Instant::now(),
            saved: 0,
            pages: 0,
            status: None,
        };

        crawl.status = self
            .post_status(
                &crawl,
                None,
                "Starting to catalog channel history, please wait...".to_string(),
            )
            .await;

        let outcome = self.run_crawl(&mut crawl).await;
        self.history.finish(channel_id);

        let elapsed = crawl.started.elapsed();
        if outcome != CrawlOutcome::ErrorAborted {
            let summary = format!(
                "``{}:`` **{} total files saved!**\n\nFinished cataloging history for ``{}``\n\n_Duration was {}_",
                format_elapsed_short(elapsed),
                format_number(crawl.saved),
                channel_id,
                format_elapsed(elapsed),
            );
            let status = crawl.status.take();
            crawl.status = self.post_status(&crawl, status, summary).await;
        }

        tracing::info!(
            channel_id = %channel_id,
            outcome = ?outcome,
            saved = crawl.saved,
            pages = crawl.pages,
            elapsed_ms = elapsed.as_millis() as u64,
            "History crawl finished"
        );
        self.emit_event(Event::HistoryFinished {
            channel_id: channel_id.to_string(),
            outcome,
            saved: crawl.saved,
            elapsed,
        });

        Ok(CrawlReport {
            outcome,
            saved: crawl.saved,
            pages: crawl.pages,
            elapsed,
        })
    }

    /// Request cancellation of the channel's crawl; false if none is active
    pub fn cancel_history(&self, channel_id: &str) -> bool {
        let cancelled = self.history.request_cancel(channel_id);
        if cancelled {
            tracing::info!(channel_id = %channel_id, "History crawl cancel requested");
        }
        cancelled
    }

    async fn run_crawl(&self, crawl: &mut Crawl<'_>) -> CrawlOutcome {
        let mut before: Option<String> = None;

        loop {
            if self.history.cancel_requested(crawl.channel_id) {
                return CrawlOutcome::Cancelled;
            }

            if crawl.pages > 0 {
                let elapsed = crawl.started.elapsed();
                let content = format!(
                    "``{}:`` {} files cataloged\n_Requesting more messages, please wait..._",
                    format_elapsed_short(elapsed),
                    crawl.saved
                );
                let status = crawl.status.take();
                crawl.status = self.post_status(crawl, status, content).await;
                self.emit_event(Event::HistoryProgress {
                    channel_id: crawl.channel_id.to_string(),
                    saved: crawl.saved,
                    elapsed,
                });
            }

            tracing::debug!(
                channel_id = %crawl.channel_id,
                saved = crawl.saved,
                before = before.as_deref().unwrap_or("latest"),
                "Requesting history page"
            );
            let page = match self
                .messenger
                .channel_messages(crawl.channel_id, HISTORY_PAGE_SIZE, before.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(channel_id = %crawl.channel_id, error = %e, "Error requesting messages");
                    let notice = Notice::new(
                        HISTORY_NOTICE_TITLE,
                        format!("Encountered an error requesting messages: {}", e),
                    );
                    if let Err(e) = self.messenger.send_notice(crawl.channel_id, &notice, None).await {
                        tracing::error!(channel_id = %crawl.channel_id, error = %e, "Failed to send error notice");
                    }
                    return CrawlOutcome::ErrorAborted;
                }
            };
            crawl.pages += 1;

            let Some(last) = page.last() else {
                return CrawlOutcome::Completed;
            };
            before = Some(last.id.clone());

            for message in &page {
                if self.history.cancel_requested(crawl.channel_id) {
                    return CrawlOutcome::Cancelled;
                }
                crawl.saved += self.download_history_message(message).await;
            }

            if page.len() < HISTORY_PAGE_SIZE {
                return CrawlOutcome::Completed;
            }
        }
    }

    /// Download a replayed message's attachments and links, returning how many
    /// files were saved
    async fn download_history_message(&self, message: &Message) -> u64 {
        let timestamp = message.time_or_now();

        let mut items: Vec<FileItem> = message
            .attachments
            .iter()
            .map(|attachment| FileItem {
                link: attachment.url.clone(),
                filename: Some(attachment.filename.clone()).filter(|f| !f.is_empty()),
                timestamp,
            })
            .collect();
        items.extend(self.resolver.resolve_links_only(message).await);
        let items = dedup_by_link(items);

        let mut saved = 0;
        for item in &items {
            match self.records.find_by_url(&item.link).await {
                Ok(existing) if !existing.is_empty() => {
                    tracing::debug!(url = %item.link, "Already downloaded, skipping");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(url = %item.link, error = %e, "Record lookup failed, downloading anyway");
                }
            }

            if self
                .start_download(item, message, Origin::History)
                .await
                .is_success()
            {
                saved += 1;
            }
        }
        saved
    }

    /// Replace the status notice, re-sending when the edit fails
    async fn post_status(
        &self,
        crawl: &Crawl<'_>,
        previous: Option<SentMessage>,
        content: String,
    ) -> Option<SentMessage> {
        let notice = Notice::new(HISTORY_NOTICE_TITLE, content);

        if let Some(previous) = previous {
            match self.messenger.edit_notice(&previous, &notice).await {
                Ok(edited) => return Some(edited),
                Err(e) => {
                    tracing::warn!(
                        channel_id = %crawl.channel_id,
                        error = %e,
                        "Failed to edit status notice, sending a new one"
                    );
                }
            }
        }

        match self.messenger.send_notice(crawl.channel_id, &notice, None).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                tracing::warn!(channel_id = %crawl.channel_id, error = %e, "Failed to send status notice");
                None
            }
        }
    }
}
