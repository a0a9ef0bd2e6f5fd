//! Core downloader implementation split into focused submodules.
//!
//! The `ChannelDownloader` struct and its methods are organized by domain:
//! - [`fetch`] - Single download attempt (request, classify, filter, write, record)
//! - [`supervisor`] - Bounded retry and failure notices
//! - [`handlers`] - Live message entry points
//! - [`history`] - Channel history backfill and cancellation

pub mod fetch;
mod handlers;
mod history;
mod supervisor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use fetch::{FetchExecutor, FetchRequest};
pub use handlers::SKIP_WORDS;
pub use history::{CrawlReport, CrawlState, HISTORY_PAGE_SIZE, HistoryRegistry};
pub use supervisor::Origin;

use std::sync::Arc;

use crate::config::{Config, PolicyStore};
use crate::db::{Database, RecordStore};
use crate::error::Result;
use crate::messenger::Messenger;
use crate::resolver::Resolver;
use crate::types::Event;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ChannelDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Per-channel policy lookup
    pub(crate) policies: Arc<dyn PolicyStore>,
    /// Persistent download records
    pub(crate) records: Arc<dyn RecordStore>,
    /// Chat platform used for notices and history paging
    pub(crate) messenger: Arc<dyn Messenger>,
    /// Link expansion chain
    pub(crate) resolver: Arc<Resolver>,
    /// Single-attempt executor shared by live and history downloads
    pub(crate) fetcher: FetchExecutor,
    /// Active history crawls
    pub(crate) history: HistoryRegistry,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl ChannelDownloader {
    /// Create a new ChannelDownloader instance
    ///
    /// Opens (and migrates) the SQLite record store at
    /// `config.persistence.database_path` and uses `config.channels` as the
    /// policy store. Links are downloaded as written until recognizers are added
    /// with [`ChannelDownloader::with_resolver`].
    pub async fn new(config: Config, messenger: Arc<dyn Messenger>) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let config = Arc::new(config);

        Self::from_parts(
            config.clone(),
            config,
            Arc::new(db),
            messenger,
            Resolver::new(),
        )
    }

    /// Assemble a downloader from explicit collaborators
    pub fn from_parts(
        config: Arc<Config>,
        policies: Arc<dyn PolicyStore>,
        records: Arc<dyn RecordStore>,
        messenger: Arc<dyn Messenger>,
        resolver: Resolver,
    ) -> Result<Self> {
        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let fetcher = FetchExecutor::new(config.download.clone(), records.clone(), event_tx.clone())?;

        Ok(Self {
            config,
            policies,
            records,
            messenger,
            resolver: Arc::new(resolver),
            fetcher,
            history: HistoryRegistry::default(),
            event_tx,
        })
    }

    /// Replace the link resolver
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Subscribe to downloader events
    ///
    /// Each subscriber receives every event emitted after subscribing.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Active history crawls
    pub fn history(&self) -> &HistoryRegistry {
        &self.history
    }

    /// Emit an event to all subscribers
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}
