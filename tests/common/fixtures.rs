//! Message fixtures and media bodies

use channel_dl::{Attachment, Embed, Message};
use chrono::{DateTime, TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Channel id used by every fixture
pub const CHANNEL_ID: &str = "700000000000000001";
/// Author of fixture messages
pub const AUTHOR_ID: &str = "800000000000000002";

/// 1x1 PNG header, enough for content sniffing
pub const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R', 0, 0, 0,
    1, 0, 0, 0, 1, 8, 6, 0, 0, 0,
];

/// GIF89a header
pub const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!";

/// ISO base media header with an `mp4` brand
pub const MP4: &[u8] = &[
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2', 0x00, 0x00, 0x00,
    0x00, b'm', b'p', b'4', b'2', b'i', b's', b'o', b'm',
];

/// Posting time shared by fixture messages
pub fn posted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 2, 29, 8, 30, 0).unwrap()
}

/// Text message in the fixture channel
pub fn text_message(id: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        channel_id: CHANNEL_ID.to_string(),
        guild_id: Some("900000000000000003".to_string()),
        author_id: AUTHOR_ID.to_string(),
        content: content.to_string(),
        timestamp: Some(posted_at()),
        ..Default::default()
    }
}

/// Message with one attachment
pub fn upload_message(id: &str, url: &str, filename: &str) -> Message {
    Message {
        attachments: vec![Attachment {
            url: url.to_string(),
            filename: filename.to_string(),
        }],
        ..text_message(id, "")
    }
}

/// Message whose only link is an embed preview image
pub fn embed_message(id: &str, image_url: &str) -> Message {
    Message {
        embeds: vec![Embed {
            url: None,
            image_url: Some(image_url.to_string()),
            video_url: None,
        }],
        ..text_message(id, "")
    }
}

/// `count` plain messages with ids `count..=1`, newest first
pub fn idle_chatter(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| text_message(&(count - i).to_string(), "nothing to see"))
        .collect()
}

/// Serve `body` at `route`
pub async fn serve(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}
