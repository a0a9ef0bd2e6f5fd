use crate::db::DownloadRecord;
use crate::downloader::history::HISTORY_NOTICE_TITLE;
use crate::downloader::supervisor::FAILURE_NOTICE_TITLE;
use crate::downloader::test_helpers::*;
use crate::downloader::{CrawlState, HISTORY_PAGE_SIZE, HistoryRegistry};
use crate::error::{Error, Result};
use crate::resolver::{Recognizer, ResolvedLink, Resolver, SitePlugin};
use crate::types::{CrawlOutcome, Event, Message};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `count` text-only messages, newest first
fn chatter(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| message(&format!("{:04}", count - i), "just talking"))
        .collect()
}

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/.+\.png$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES.to_vec()))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn pages_until_a_short_page() {
    let t = create_test_downloader(FakeMessenger::with_history(chatter(150)), |_| {}).await;

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.pages, 2);
    let requests = t.messenger.page_requests();
    assert_eq!(
        requests,
        vec![
            (HISTORY_PAGE_SIZE, None),
            (HISTORY_PAGE_SIZE, Some(t.messenger.history[99].id.clone())),
        ]
    );
}

#[tokio::test]
async fn full_last_page_needs_one_more_request() {
    let t = create_test_downloader(FakeMessenger::with_history(chatter(100)), |_| {}).await;

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.pages, 2);
    assert_eq!(t.messenger.page_requests()[1].1.as_deref(), Some("0001"));
}

#[tokio::test]
async fn empty_channel_completes_after_one_request() {
    let t = create_test_downloader(FakeMessenger::default(), |_| {}).await;

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.saved, 0);
    assert_eq!(report.pages, 1);
}

#[tokio::test]
async fn counts_only_saved_files() {
    let server = image_server().await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("words"))
        .mount(&server)
        .await;
    let history = vec![
        attachment_message("3", &format!("{}/img/a.png", server.uri()), "a.png"),
        message("2", &format!("see {}/notes.txt", server.uri())),
        message("1", &format!("and {}/img/b.png", server.uri())),
    ];
    let t = create_test_downloader(FakeMessenger::with_history(history), |_| {}).await;

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.saved, 2);
    assert!(t.destination().join("a.png").exists());
    assert!(t.destination().join("b.png").exists());

    let (_, summary) = t.messenger.edits().pop().unwrap();
    assert_eq!(summary.title, HISTORY_NOTICE_TITLE);
    assert!(summary.content.contains("**2 total files saved!**"));
    assert!(summary.content.contains(&format!("Finished cataloging history for ``{CHANNEL}``")));
}

#[tokio::test]
async fn recorded_links_are_not_fetched_again() {
    let server = image_server().await;
    let url = format!("{}/img/old.png", server.uri());
    let t = create_test_downloader(
        FakeMessenger::with_history(vec![attachment_message("1", &url, "old.png")]),
        |_| {},
    )
    .await;
    t.db.insert_record(&DownloadRecord {
        url: url.clone(),
        downloaded_at: Utc::now(),
        destination: t.destination().join("renamed.png"),
        filename: "renamed.png".to_string(),
        channel_id: CHANNEL.to_string(),
        user_id: AUTHOR.to_string(),
    })
    .await
    .unwrap();

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.saved, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failures_are_not_announced_during_history() {
    let mut broken = attachment_message("1", "http://127.0.0.1:1/img/gone.png", "gone.png");
    broken.content = "nothing else".to_string();
    let t = create_test_downloader(FakeMessenger::with_history(vec![broken]), |p| {
        p.retry_attempts = Some(1);
    })
    .await;

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.saved, 0);
    assert!(t.messenger.sent_titled(FAILURE_NOTICE_TITLE).is_empty());
}

#[tokio::test]
async fn page_error_aborts_without_summary() {
    let messenger = FakeMessenger {
        pages_before_failure: Some(1),
        ..FakeMessenger::with_history(chatter(150))
    };
    let t = create_test_downloader(messenger, |_| {}).await;

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::ErrorAborted);
    assert_eq!(report.pages, 1);
    assert_eq!(t.downloader.history().state(CHANNEL), None);

    let sent = t.messenger.sent_titled(HISTORY_NOTICE_TITLE);
    assert_eq!(sent.len(), 2);
    assert!(
        sent[1]
            .notice
            .content
            .starts_with("Encountered an error requesting messages: ")
    );
    assert!(
        t.messenger
            .edits()
            .iter()
            .all(|(_, notice)| !notice.content.contains("total files saved"))
    );
}

#[tokio::test]
async fn progress_is_reported_between_pages() {
    let t = create_test_downloader(FakeMessenger::with_history(chatter(150)), |_| {}).await;
    let mut events = t.downloader.subscribe();

    t.downloader.crawl_history(CHANNEL).await.unwrap();

    let edits = t.messenger.edits();
    assert_eq!(edits.len(), 2);
    assert!(edits[0].1.content.contains("0 files cataloged"));
    assert!(edits[0].1.content.contains("Requesting more messages"));
    assert_eq!(edits[0].0, edits[1].0);

    assert!(matches!(events.recv().await.unwrap(), Event::HistoryStarted { .. }));
    assert!(matches!(
        events.recv().await.unwrap(),
        Event::HistoryProgress { saved: 0, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        Event::HistoryFinished {
            outcome: CrawlOutcome::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn failed_edits_post_new_notices() {
    let messenger = FakeMessenger {
        fail_edits: true,
        ..FakeMessenger::with_history(chatter(150))
    };
    let t = create_test_downloader(messenger, |_| {}).await;

    let report = t.downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    let sent = t.messenger.sent_titled(HISTORY_NOTICE_TITLE);
    assert_eq!(sent.len(), 3);
    assert!(sent[2].notice.content.contains("total files saved"));
}

#[tokio::test]
async fn unregistered_channel_is_rejected() {
    let t = create_test_downloader(FakeMessenger::default(), |_| {}).await;

    let result = t.downloader.crawl_history("elsewhere").await;

    assert!(matches!(result, Err(Error::ChannelNotRegistered(id)) if id == "elsewhere"));
    assert!(t.messenger.page_requests().is_empty());
}

#[tokio::test]
async fn one_crawl_per_channel() {
    let t = create_test_downloader(FakeMessenger::default(), |_| {}).await;
    assert!(t.downloader.history().begin(CHANNEL));

    let result = t.downloader.crawl_history(CHANNEL).await;

    assert!(matches!(result, Err(Error::HistoryInProgress(_))));
    assert_eq!(
        t.downloader.history().state(CHANNEL),
        Some(CrawlState::Downloading)
    );
}

#[tokio::test]
async fn cancel_without_crawl_is_refused() {
    let t = create_test_downloader(FakeMessenger::default(), |_| {}).await;

    assert!(!t.downloader.cancel_history(CHANNEL));
}

#[test]
fn registry_tracks_crawl_lifecycle() {
    let registry = HistoryRegistry::default();

    assert!(registry.begin("a"));
    assert!(!registry.begin("a"));
    assert!(registry.begin("b"));
    assert!(registry.request_cancel("a"));
    assert_eq!(registry.state("a"), Some(CrawlState::CancelRequested));
    assert_eq!(registry.state("b"), Some(CrawlState::Downloading));

    registry.finish("a");
    assert_eq!(registry.state("a"), None);
    assert!(!registry.request_cancel("a"));
    assert!(registry.begin("a"));
}

/// Requests cancellation of the crawl the first time it resolves a link
struct CancellingPlugin {
    registry: HistoryRegistry,
    target: String,
}

#[async_trait]
impl SitePlugin for CancellingPlugin {
    async fn resolve(&self, _url: &str) -> Result<Vec<ResolvedLink>> {
        self.registry.request_cancel(CHANNEL);
        Ok(vec![ResolvedLink::new(self.target.clone(), "first.png")])
    }
}

#[tokio::test]
async fn cancel_stops_before_next_message() {
    let server = image_server().await;
    let history = vec![
        message("3", "https://cancel.test/now"),
        message("2", &format!("{}/img/second.png", server.uri())),
        message("1", &format!("{}/img/third.png", server.uri())),
    ];
    let t = create_test_downloader(FakeMessenger::with_history(history), |_| {}).await;
    let plugin = CancellingPlugin {
        registry: t.downloader.history().clone(),
        target: format!("{}/img/first.png", server.uri()),
    };
    let resolver = Resolver::new().with_recognizer(
        Recognizer::new("cancel", r"^https://cancel\.test/", Arc::new(plugin)).unwrap(),
    );
    let downloader = t.downloader.clone().with_resolver(resolver);

    let report = downloader.crawl_history(CHANNEL).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Cancelled);
    assert_eq!(report.saved, 1);
    assert!(t.destination().join("first.png").exists());
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(requested, vec!["/img/first.png"]);
    assert_eq!(downloader.history().state(CHANNEL), None);

    let (_, summary) = t.messenger.edits().pop().unwrap();
    assert!(summary.content.contains("**1 total files saved!**"));
}
