//! Configuration types for channel-dl

use crate::classify::ContentClass;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, path::PathBuf, time::Duration};

/// Fetch behavior shared by every channel
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User agent sent with every fetch (default: a desktop browser string)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// strftime pattern prefixed to every saved filename (default: "%Y-%m-%d_%H-%M-%S ")
    #[serde(default = "default_filename_date_format")]
    pub filename_date_format: String,

    /// Process messages written by the bot account itself (default: false)
    #[serde(default)]
    pub scan_own_messages: bool,

    /// Honor skip words in message content (default: true)
    #[serde(default = "default_true")]
    pub allow_skipping: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            filename_date_format: default_filename_date_format(),
            scan_own_messages: false,
            allow_skipping: true,
        }
    }
}

/// Retry configuration for failed download attempts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per file, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure (default: 5 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 5 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied per failed attempt (default: 1.0, a fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_retry_delay(),
            max_delay: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./database.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// What to do when the composed target path already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateFilenames {
    /// Keep the existing file and skip the download (default)
    #[default]
    Skip,
    /// Save under `name-1.ext`, `name-2.ext`, ... until a free path is found
    Suffix,
}

/// Per-channel download rules
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelPolicy {
    /// Process messages from this channel at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root directory for this channel's files
    pub destination: PathBuf,

    /// Keep `image/*` content (default: true)
    #[serde(default = "default_true")]
    pub save_images: bool,

    /// Keep `video/*` content (default: true)
    #[serde(default = "default_true")]
    pub save_videos: bool,

    /// Keep `audio/*` content (default: false)
    #[serde(default)]
    pub save_audio_files: bool,

    /// Keep `text/*` content (default: false)
    #[serde(default)]
    pub save_text_files: bool,

    /// Keep `application/*` content (default: false)
    #[serde(default)]
    pub save_other_files: bool,

    /// Hosts never downloaded from (exact hostname match)
    #[serde(default)]
    pub domain_blacklist: Option<Vec<String>>,

    /// Extensions never saved, with leading dot (e.g. ".exe")
    #[serde(default)]
    pub extension_blacklist: Vec<String>,

    /// Sort files into images/, videos/, audio/, text/, applications/ (default: false)
    #[serde(default)]
    pub divide_folders_by_type: bool,

    /// Collision handling for existing target paths
    #[serde(default)]
    pub duplicate_filenames: DuplicateFilenames,

    /// Overrides the global filename date format when set and non-empty
    #[serde(default)]
    pub filename_date_format: Option<String>,

    /// Overrides the global retry attempt count
    #[serde(default)]
    pub retry_attempts: Option<u32>,

    /// Overrides the global request timeout (seconds)
    #[serde(default, with = "optional_duration_serde")]
    pub timeout: Option<Duration>,

    /// Post a failure notice to the channel after retries are exhausted (default: true)
    #[serde(default = "default_true")]
    pub error_messages: bool,

    /// Re-process messages when they are edited (default: true)
    #[serde(default = "default_true")]
    pub scan_edits: bool,

    /// Overrides the global skip-word setting
    #[serde(default)]
    pub allow_skipping: Option<bool>,
}

impl ChannelPolicy {
    /// Policy with defaults saving into `destination`
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            destination: destination.into(),
            save_images: true,
            save_videos: true,
            save_audio_files: false,
            save_text_files: false,
            save_other_files: false,
            domain_blacklist: None,
            extension_blacklist: Vec::new(),
            divide_folders_by_type: false,
            duplicate_filenames: DuplicateFilenames::default(),
            filename_date_format: None,
            retry_attempts: None,
            timeout: None,
            error_messages: true,
            scan_edits: true,
            allow_skipping: None,
        }
    }

    /// Whether content of the given coarse class may be saved
    pub fn allows(&self, class: ContentClass) -> bool {
        match class {
            ContentClass::Image => self.save_images,
            ContentClass::Video => self.save_videos,
            ContentClass::Audio => self.save_audio_files,
            ContentClass::Text => self.save_text_files,
            ContentClass::Application => self.save_other_files,
            ContentClass::Other => false,
        }
    }

    /// Whether the host is on the domain blacklist
    pub fn blocks_domain(&self, host: &str) -> bool {
        self.domain_blacklist
            .as_ref()
            .is_some_and(|list| list.iter().any(|d| d.eq_ignore_ascii_case(host)))
    }

    /// The effective filename date format for this channel
    pub fn date_format<'a>(&'a self, global: &'a str) -> &'a str {
        match self.filename_date_format.as_deref() {
            Some(format) if !format.is_empty() => format,
            _ => global,
        }
    }
}

/// Read access to per-channel policies
pub trait PolicyStore: Send + Sync {
    /// Policy for the channel, `None` when the channel is not registered
    fn policy(&self, channel_id: &str) -> Option<ChannelPolicy>;

    /// Whether the channel has a policy
    fn is_registered(&self, channel_id: &str) -> bool {
        self.policy(channel_id).is_some()
    }
}

/// Main configuration for ChannelDownloader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch behavior (timeouts, user agent, filename prefix)
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for failed attempts
    #[serde(default)]
    pub retry: RetryConfig,

    /// Record store location
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Registered channels keyed by channel id
    #[serde(default)]
    pub channels: HashMap<String, ChannelPolicy>,
}

impl Config {
    /// Load a JSON settings file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        for (channel_id, policy) in &self.channels {
            if policy.destination.as_os_str().is_empty() {
                return Err(Error::Config {
                    message: format!("channel {channel_id} has an empty destination"),
                    key: Some("channels".to_string()),
                });
            }
            if policy.timeout.is_some_and(|timeout| timeout.is_zero()) {
                return Err(Error::Config {
                    message: format!("channel {channel_id} timeout must be greater than zero"),
                    key: Some("timeout".to_string()),
                });
            }
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(Error::Config {
                message: format!("invalid backoff_multiplier {multiplier}"),
                key: Some("backoff_multiplier".to_string()),
            });
        }
        if self.download.timeout.is_zero() {
            return Err(Error::Config {
                message: "timeout must be greater than zero".to_string(),
                key: Some("timeout".to_string()),
            });
        }
        Ok(())
    }

    /// Register or replace a channel policy
    pub fn with_channel(mut self, channel_id: impl Into<String>, policy: ChannelPolicy) -> Self {
        self.channels.insert(channel_id.into(), policy);
        self
    }
}

impl PolicyStore for Config {
    fn policy(&self, channel_id: &str) -> Option<ChannelPolicy> {
        self.channels.get(channel_id).cloned()
    }

    fn is_registered(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/66.0.3359.139 Safari/537.36".to_string()
}

fn default_filename_date_format() -> String {
    "%Y-%m-%d_%H-%M-%S ".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./database.db")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
