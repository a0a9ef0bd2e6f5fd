//! Raw link collection from message content.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::{FileItem, Message};

/// A link found in a message before site resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLink {
    /// URL as written
    pub link: String,
    /// Uploader-supplied filename (attachments only)
    pub filename: Option<String>,
}

// The pattern is a literal, so compilation cannot fail
#[allow(clippy::unwrap_used)]
fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Scheme is mandatory; `<`/`>` end a link so `<https://...>` works
    PATTERN.get_or_init(|| Regex::new(r#"(?i)\b[a-z][a-z0-9+.\-]*://[^\s<>"'`]+"#).unwrap())
}

/// Every URL with an explicit scheme in `text`, in order of appearance.
///
/// Trailing sentence punctuation and unbalanced closing brackets are not part
/// of the link.
pub fn extract_urls(text: &str) -> Vec<String> {
    url_pattern()
        .find_iter(text)
        .map(|m| trim_trailing(m.as_str()))
        .filter(|link| link.contains("://") && !link.ends_with("://"))
        .map(str::to_string)
        .collect()
}

fn trim_trailing(mut link: &str) -> &str {
    loop {
        let Some(last) = link.chars().last() else {
            return link;
        };
        let unbalanced = |open: char, close: char| {
            last == close && link.matches(open).count() < link.matches(close).count()
        };
        if matches!(last, '.' | ',' | ':' | ';' | '!' | '?')
            || unbalanced('(', ')')
            || unbalanced('[', ']')
        {
            link = &link[..link.len() - last.len_utf8()];
        } else {
            return link;
        }
    }
}

/// Candidate links of a message: attachments (when requested), then URLs in the
/// text, then embed URLs, image URLs and video URLs.
pub fn raw_links(message: &Message, include_attachments: bool) -> Vec<RawLink> {
    let mut links = Vec::new();

    if include_attachments {
        links.extend(message.attachments.iter().map(|a| RawLink {
            link: a.url.clone(),
            filename: Some(a.filename.clone()).filter(|f| !f.is_empty()),
        }));
    }

    links.extend(extract_urls(&message.content).into_iter().map(|link| RawLink {
        link,
        filename: None,
    }));

    for embed in &message.embeds {
        for url in [&embed.url, &embed.image_url, &embed.video_url]
            .into_iter()
            .flatten()
            .filter(|u| !u.is_empty())
        {
            links.push(RawLink {
                link: url.clone(),
                filename: None,
            });
        }
    }

    links
}

/// Drop items whose link was already seen, keeping first-seen order
pub fn dedup_by_link(items: Vec<FileItem>) -> Vec<FileItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.link.clone()))
        .collect()
}
