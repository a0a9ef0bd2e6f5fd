//! Utility functions for filenames, paths and human-readable formatting

use crate::config::DuplicateFilenames;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Maximum number of suffixes tried when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a free path for a file, handling collisions according to the channel rule
///
/// # Arguments
///
/// * `path` - The desired file path
/// * `rule` - How to handle an existing file at `path`
///
/// # Returns
///
/// `Some(path)` when `path` is free. For [`DuplicateFilenames::Skip`] an existing
/// file yields `None`. For [`DuplicateFilenames::Suffix`] the stem gets `-1`,
/// `-2`, ... until a free path is found; `None` if every candidate is taken.
///
/// # Examples
///
/// ```
/// use channel_dl::utils::unique_path;
/// use channel_dl::config::DuplicateFilenames;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/does-not-exist/cat.png");
/// let free = unique_path(path, DuplicateFilenames::Suffix);
/// // If cat.png exists, returns cat-1.png; if that exists too, cat-2.png, etc.
/// assert_eq!(free.as_deref(), Some(path));
/// ```
pub fn unique_path(path: &Path, rule: DuplicateFilenames) -> Option<PathBuf> {
    if !path.exists() {
        return Some(path.to_path_buf());
    }

    match rule {
        DuplicateFilenames::Skip => None,
        DuplicateFilenames::Suffix => {
            let stem = path.file_stem()?;
            let extension = path.extension();
            let parent = path.parent()?;

            (1..=MAX_RENAME_ATTEMPTS)
                .map(|i| {
                    let mut name = stem.to_os_string();
                    name.push(format!("-{i}"));
                    if let Some(ext) = extension {
                        name.push(".");
                        name.push(ext);
                    }
                    parent.join(name)
                })
                .find(|candidate| !candidate.exists())
        }
    }
}

/// Last path segment of `url`, percent-decoded.
///
/// Returns `None` for unparseable URLs and URLs ending in `/`.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    Some(decode_or_raw(last))
}

/// Filename carried by a `Content-Disposition` header, if any
///
/// Handles both `filename="name.ext"` and the RFC 5987 form
/// `filename*=UTF-8''encoded%20name.ext`. Values are percent-decoded; a value
/// that does not decode is returned as written.
pub fn content_disposition_filename(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;

    let mut plain = None;
    for part in value.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'encoded-filename
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            let name = decode_or_raw(encoded.trim_matches('"'));
            if !name.is_empty() {
                return Some(name);
            }
        } else if let Some(raw) = part.strip_prefix("filename=") {
            let name = decode_or_raw(raw.trim_matches('"'));
            if !name.is_empty() {
                plain = Some(name);
            }
        }
    }
    plain
}

fn decode_or_raw(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

// The pattern is a literal, so compilation cannot fail
#[allow(clippy::unwrap_used)]
fn safe_filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"^[^/\\:*?"<>|]{1,150}\.[A-Za-z0-9]{2,4}$"#).unwrap())
}

/// Whether `name` can be written as-is on every common filesystem: no path or
/// shell-reserved characters, at most 150 characters before a 2-4 character
/// alphanumeric extension.
pub fn is_safe_filename(name: &str) -> bool {
    safe_filename_pattern().is_match(name)
}

const UNITS: &[(u64, &str)] = &[
    (7 * 24 * 60 * 60, "week"),
    (24 * 60 * 60, "day"),
    (60 * 60, "hour"),
    (60, "minute"),
    (1, "second"),
];

fn unit(value: u64, name: &str) -> String {
    if value == 1 {
        format!("{value} {name}")
    } else {
        format!("{value} {name}s")
    }
}

/// Largest non-zero unit of a duration, e.g. `2 hours` or `45 seconds`
pub fn format_elapsed_short(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    UNITS
        .iter()
        .find(|(size, _)| secs >= *size)
        .map(|(size, name)| unit(secs / size, name))
        .unwrap_or_else(|| unit(elapsed.subsec_millis().into(), "millisecond"))
}

/// Every non-zero unit of a duration, e.g. `1 hour 2 minutes 5 seconds`
pub fn format_elapsed(elapsed: Duration) -> String {
    let mut remaining = elapsed.as_secs();
    let parts: Vec<String> = UNITS
        .iter()
        .filter_map(|(size, name)| {
            let value = remaining / size;
            remaining %= size;
            (value > 0).then(|| unit(value, name))
        })
        .collect();

    if parts.is_empty() {
        format_elapsed_short(elapsed)
    } else {
        parts.join(" ")
    }
}

/// Decimal representation with `,` thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
