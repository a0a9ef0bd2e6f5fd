//! Content sniffing and classification.
//!
//! The declared `Content-Type` header is never trusted; the class of a download
//! is decided from the first bytes of the body.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading bytes inspected when sniffing
const SNIFF_LEN: usize = 512;

/// Extensions that look like bare domains (`example.com`) rather than files
const DOMAIN_LIKE_EXTENSIONS: &[&str] = &[".com", ".net", ".org"];

/// `application/*` extensions that are really video
const VIDEO_AS_APPLICATION: &[&str] = &[".mov"];

/// `application/*` extensions that are really images (raw and layered formats)
const IMAGE_AS_APPLICATION: &[&str] = &[".psd", ".nef", ".dng", ".tif", ".tiff"];

/// Coarse content class: the token before `/` in a MIME type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentClass {
    /// `image/*`
    Image,
    /// `video/*`
    Video,
    /// `audio/*`
    Audio,
    /// `text/*`
    Text,
    /// `application/*`
    Application,
    /// Anything else (`font/*`, `model/*`, ...); never permitted
    Other,
}

impl ContentClass {
    /// Class of a MIME type string such as `image/png; charset=binary`
    pub fn from_mime(mime: &str) -> Self {
        let top = mime.split('/').next().unwrap_or("").trim();
        match top.to_ascii_lowercase().as_str() {
            "image" => ContentClass::Image,
            "video" => ContentClass::Video,
            "audio" => ContentClass::Audio,
            "text" => ContentClass::Text,
            "application" => ContentClass::Application,
            _ => ContentClass::Other,
        }
    }

    /// Lowercase name as it appears in MIME types
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentClass::Image => "image",
            ContentClass::Video => "video",
            ContentClass::Audio => "audio",
            ContentClass::Text => "text",
            ContentClass::Application => "application",
            ContentClass::Other => "other",
        }
    }
}

impl fmt::Display for ContentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected MIME type of a body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sniffed {
    /// Full MIME type, possibly with parameters
    pub mime: String,
    /// Coarse class of `mime`
    pub class: ContentClass,
}

/// Detect the MIME type of `body` from its leading bytes.
///
/// Magic-number formats are recognized with `infer`. Bodies without a known
/// signature are `text/html` when they start with an HTML marker, `text/plain`
/// when they contain no binary control bytes, and `application/octet-stream`
/// otherwise.
pub fn sniff(body: &[u8]) -> Sniffed {
    let mime = match infer::get(body) {
        Some(kind) => kind.mime_type().to_string(),
        None => sniff_textual(&body[..body.len().min(SNIFF_LEN)]).to_string(),
    };
    let class = ContentClass::from_mime(&mime);
    Sniffed { mime, class }
}

fn sniff_textual(head: &[u8]) -> &'static str {
    let trimmed = match head.iter().position(|b| !b.is_ascii_whitespace()) {
        Some(start) => &head[start..],
        None => return "text/plain; charset=utf-8",
    };

    const HTML_MARKERS: &[&[u8]] = &[
        b"<!doctype html",
        b"<html",
        b"<head",
        b"<body",
        b"<script",
        b"<iframe",
        b"<title",
        b"<div",
        b"<p",
    ];
    let lower: Vec<u8> = trimmed
        .iter()
        .take(16)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    if HTML_MARKERS.iter().any(|marker| {
        lower.starts_with(marker)
            && matches!(lower.get(marker.len()), Some(b' ') | Some(b'>') | None)
    }) {
        return "text/html; charset=utf-8";
    }
    if lower.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    let binary = head
        .iter()
        .any(|&b| matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F));
    if binary {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}

/// Extension of a filename including the leading dot, or `""`.
///
/// Only the last dot counts: `archive.tar.gz` yields `.gz`.
pub fn file_extension(filename: &str) -> &str {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}

/// Whether an extension is on the channel blacklist or looks like a bare domain
pub fn is_blacklisted_extension(extension: &str, blacklist: &[String]) -> bool {
    blacklist
        .iter()
        .map(String::as_str)
        .chain(DOMAIN_LIKE_EXTENSIONS.iter().copied())
        .any(|blocked| blocked.eq_ignore_ascii_case(extension))
}

/// Extension (with dot) to give a placeholder filename of the given MIME type
pub fn extension_for_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    mime_guess::get_mime_extensions_str(essence)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
}

/// Subfolder for a file when channels divide folders by type.
///
/// Some formats are sniffed as `application/*` but belong with videos or images;
/// those are moved by extension. The returned class is the class used for the
/// folder only: permission checks happen earlier against the sniffed class.
pub fn subfolder_for(class: ContentClass, extension: &str) -> Option<(ContentClass, &'static str)> {
    let is = |list: &[&str]| list.iter().any(|e| e.eq_ignore_ascii_case(extension));
    match class {
        ContentClass::Image => Some((ContentClass::Image, "images")),
        ContentClass::Video => Some((ContentClass::Video, "videos")),
        ContentClass::Audio => Some((ContentClass::Audio, "audio")),
        ContentClass::Text => Some((ContentClass::Text, "text")),
        ContentClass::Application if is(VIDEO_AS_APPLICATION) => {
            Some((ContentClass::Video, "videos"))
        }
        ContentClass::Application if is(IMAGE_AS_APPLICATION) => {
            Some((ContentClass::Image, "images"))
        }
        ContentClass::Application => Some((ContentClass::Application, "applications")),
        ContentClass::Other => None,
    }
}
