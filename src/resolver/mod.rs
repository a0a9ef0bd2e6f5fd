//! Turning messages into download candidates.
//!
//! A [`Resolver`] holds an ordered list of [`Recognizer`]s. Each recognizer pairs
//! URL patterns with a [`SitePlugin`] that expands a share link into direct
//! download links. The first recognizer whose pattern matches and whose plugin
//! returns results wins, so more general patterns must be registered last.
//!
//! Plugin failures never escape the resolver: a failing or empty plugin falls
//! through to the next matching recognizer, and a link nobody resolves is
//! downloaded as written.

mod links;

pub use links::{RawLink, dedup_by_link, extract_urls, raw_links};

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{FileItem, Message};

/// Custom emoji images served from the platform CDN
const EMOJI_CDN_PATTERN: &str = r"^https://cdn\.discordapp\.com/emojis/";

/// A direct download link produced by a plugin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Final URL to fetch
    pub url: String,
    /// Suggested filename
    pub filename: Option<String>,
}

impl ResolvedLink {
    /// Link with a suggested filename; an empty name counts as none
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            url: url.into(),
            filename: Some(filename).filter(|f| !f.is_empty()),
        }
    }

    /// Link without a suggested filename
    pub fn bare(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
        }
    }
}

/// Expands one platform-specific URL into direct download links
#[async_trait]
pub trait SitePlugin: Send + Sync {
    /// Resolve `url`; an empty list means the plugin found nothing
    async fn resolve(&self, url: &str) -> Result<Vec<ResolvedLink>>;
}

/// URL patterns bound to the plugin that handles them
pub struct Recognizer {
    name: String,
    patterns: Vec<Regex>,
    plugin: Arc<dyn SitePlugin>,
}

impl Recognizer {
    /// Recognizer for a single pattern
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        plugin: Arc<dyn SitePlugin>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            patterns: vec![compile(pattern)?],
            plugin,
        })
    }

    /// Add an alternative pattern handled by the same plugin
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns.push(compile(pattern)?);
        Ok(self)
    }

    /// Recognizer name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any pattern matches `url`
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(url))
    }
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

// The pattern is a literal, so compilation cannot fail
#[allow(clippy::expect_used)]
fn emoji_pattern() -> Regex {
    Regex::new(EMOJI_CDN_PATTERN).expect("emoji pattern is valid")
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config {
        message: format!("invalid link pattern {pattern:?}: {e}"),
        key: Some("recognizers".to_string()),
    })
}

/// Ordered recognizer chain plus a denylist of links never downloaded
#[derive(Debug)]
pub struct Resolver {
    recognizers: Vec<Recognizer>,
    denylist: Vec<Regex>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Resolver with no recognizers that refuses custom emoji images
    pub fn new() -> Self {
        Self {
            recognizers: Vec::new(),
            denylist: vec![emoji_pattern()],
        }
    }

    /// Append a recognizer; it is tried after every recognizer added before it
    pub fn with_recognizer(mut self, recognizer: Recognizer) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    /// Never download links matching `pattern`
    pub fn deny(mut self, pattern: &str) -> Result<Self> {
        self.denylist.push(compile(pattern)?);
        Ok(self)
    }

    /// Recognizers in evaluation order
    pub fn recognizers(&self) -> &[Recognizer] {
        &self.recognizers
    }

    fn is_denied(&self, url: &str) -> bool {
        self.denylist.iter().any(|p| p.is_match(url))
    }

    /// Expand one link into direct download links.
    ///
    /// Denied links yield nothing. Otherwise the first matching recognizer whose
    /// plugin returns results wins. When nothing resolves and the link has a
    /// query string, resolution runs once more on the link without it; the bare
    /// link is then returned as is.
    pub async fn resolve_link(&self, url: &str) -> Vec<ResolvedLink> {
        let mut candidate = url.to_string();
        let mut stripped_once = false;

        loop {
            if self.is_denied(&candidate) {
                tracing::debug!(url = %candidate, "Skipping denylisted link");
                return Vec::new();
            }

            if let Some(links) = self.try_recognizers(&candidate).await {
                return links;
            }

            if !stripped_once && let Some(bare) = strip_query(&candidate) {
                tracing::debug!(url = %candidate, bare = %bare, "Retrying without query");
                candidate = bare;
                stripped_once = true;
                continue;
            }

            return vec![ResolvedLink::bare(candidate)];
        }
    }

    async fn try_recognizers(&self, url: &str) -> Option<Vec<ResolvedLink>> {
        for recognizer in self.recognizers.iter().filter(|r| r.matches(url)) {
            match recognizer.plugin.resolve(url).await {
                Ok(links) if !links.is_empty() => {
                    tracing::debug!(
                        url = %url,
                        recognizer = %recognizer.name,
                        count = links.len(),
                        "Resolved link"
                    );
                    return Some(links);
                }
                Ok(_) => {
                    tracing::debug!(url = %url, recognizer = %recognizer.name, "Plugin found nothing");
                }
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        recognizer = %recognizer.name,
                        error = %e,
                        "Plugin failed, trying next recognizer"
                    );
                }
            }
        }
        None
    }

    /// Download candidates of a message: attachments, text URLs and embed URLs,
    /// each expanded through the recognizer chain and deduplicated by link.
    pub async fn resolve(&self, message: &Message) -> Vec<FileItem> {
        self.resolve_raw(message, raw_links(message, true)).await
    }

    /// Like [`Resolver::resolve`] but without the message's attachments
    pub async fn resolve_links_only(&self, message: &Message) -> Vec<FileItem> {
        self.resolve_raw(message, raw_links(message, false)).await
    }

    async fn resolve_raw(&self, message: &Message, raw: Vec<RawLink>) -> Vec<FileItem> {
        let timestamp = message.time_or_now();
        let mut items = Vec::new();

        for raw_link in raw {
            for resolved in self.resolve_link(&raw_link.link).await {
                items.push(FileItem {
                    link: resolved.url,
                    filename: raw_link.filename.clone().or(resolved.filename),
                    timestamp,
                });
            }
        }

        dedup_by_link(items)
    }
}

/// `url` without its query string, or `None` if it has none or does not parse
pub fn strip_query(url: &str) -> Option<String> {
    let mut parsed = url::Url::parse(url).ok()?;
    parsed.query()?;
    parsed.set_query(None);
    Some(parsed.to_string())
}
