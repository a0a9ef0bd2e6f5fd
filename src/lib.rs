//! # channel-dl
//!
//! Media archiving pipeline for chat channels.
//!
//! ## Design Philosophy
//!
//! channel-dl is designed to be:
//! - **Policy-driven** - Every channel decides what content it keeps and where
//! - **Platform-agnostic** - The chat platform is reached only through [`Messenger`]
//! - **Library-first** - No bot frontend, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! A message flows through the [`Resolver`] (raw links to candidate files), then
//! each candidate is fetched by the retry supervisor, which runs single attempts
//! until one succeeds, is skipped by policy, or the attempt budget is spent.
//! History crawls replay the same pipeline over a channel's past messages.
//!
//! ## Quick Start
//!
//! ```no_run
//! use channel_dl::config::ChannelPolicy;
//! use channel_dl::{ChannelDownloader, Config, Messenger};
//! use std::sync::Arc;
//!
//! # async fn example(messenger: Arc<dyn Messenger>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default()
//!     .with_channel("1234567890", ChannelPolicy::new("archive/general"));
//!
//! let downloader = ChannelDownloader::new(config, messenger).await?;
//!
//! // Subscribe to events
//! let mut events = downloader.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! // Backfill everything already posted
//! let report = downloader.crawl_history("1234567890").await?;
//! println!("saved {} files", report.saved);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Content sniffing and classification
pub mod classify;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Chat platform seam
pub mod messenger;
/// Link resolution
pub mod resolver;
/// Bounded retry
pub mod retry;
/// Download status taxonomy
pub mod status;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use classify::ContentClass;
pub use config::{ChannelPolicy, Config, DuplicateFilenames, PolicyStore};
pub use db::{Database, DownloadRecord, RecordStore};
pub use downloader::{ChannelDownloader, CrawlReport, CrawlState, Origin};
pub use error::{DatabaseError, Error, Result};
pub use messenger::{Messenger, Notice, SentMessage};
pub use resolver::{Recognizer, ResolvedLink, Resolver, SitePlugin};
pub use status::{DownloadStatus, FailureKind, Outcome, SkipReason};
pub use types::{Attachment, CrawlOutcome, Embed, Event, FileItem, Message};
