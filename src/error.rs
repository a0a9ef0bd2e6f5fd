//! Error types for channel-dl
//!
//! Per-item download problems are not errors: they are reported as
//! [`Outcome`](crate::status::Outcome)s. The [`Error`] type here covers the seams
//! where the pipeline talks to its collaborators:
//! - the record store (SQLite)
//! - the messaging platform
//! - site-resolution plugins
//! - configuration loading

use thiserror::Error;

/// Result type alias for channel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for channel-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "channels")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL could not be parsed
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A site-resolution plugin failed to expand a link
    #[error("plugin {plugin} failed for {url}: {message}")]
    Plugin {
        /// Name of the recognizer whose plugin failed
        plugin: String,
        /// The link handed to the plugin
        url: String,
        /// Failure description reported by the plugin
        message: String,
    },

    /// The messaging platform rejected or failed a request
    #[error("messaging error: {0}")]
    Messaging(String),

    /// Channel has no policy in the policy store
    #[error("channel {0} is not registered")]
    ChannelNotRegistered(String),

    /// A history crawl is already running for the channel
    #[error("history crawl already in progress for channel {0}")]
    HistoryInProgress(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl Error {
    /// Shorthand for a plugin failure
    pub fn plugin(
        plugin: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            url: url.into(),
            message: message.into(),
        }
    }
}
