//! Single download attempt: request, classify, filter, place, write, record.

use chrono::{DateTime, Local, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::classify;
use crate::config::{ChannelPolicy, DownloadConfig};
use crate::db::{DownloadRecord, RecordStore};
use crate::error::{Error, Result};
use crate::status::{FailureKind, Outcome, SkipReason};
use crate::types::Event;
use crate::utils;

/// Name used when neither the source nor the response supplies a usable filename
const PLACEHOLDER_FILENAME: &str = "InvalidFilename";

/// Everything one attempt needs to know about the item being fetched
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Link to request
    pub url: String,
    /// Filename to use instead of deriving one from the response
    pub filename: Option<String>,
    /// Destination root
    pub destination: PathBuf,
    /// Channel the link was posted in
    pub channel_id: String,
    /// User who posted the link
    pub user_id: String,
    /// Original posting time, applied to the written file
    pub timestamp: DateTime<Utc>,
}

/// Performs one fetch attempt at a time; retrying is the caller's concern
#[derive(Clone)]
pub struct FetchExecutor {
    client: reqwest::Client,
    settings: Arc<DownloadConfig>,
    records: Arc<dyn RecordStore>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    next_download_id: Arc<AtomicU64>,
}

impl FetchExecutor {
    /// Create an executor writing records to `records` and events to `event_tx`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(
        settings: DownloadConfig,
        records: Arc<dyn RecordStore>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Result<Self> {
        // No gzip/brotli features are enabled, so bodies arrive byte-for-byte
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings: Arc::new(settings),
            records,
            event_tx,
            next_download_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Run a single attempt for `request` under `policy`
    ///
    /// Never returns an error: every problem is an [`Outcome`].
    pub async fn fetch(&self, request: &FetchRequest, policy: &ChannelPolicy) -> Outcome {
        let download_id = self.next_download_id.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let outcome = self.attempt(download_id, request, policy).await;

        tracing::debug!(
            download_id,
            url = %request.url,
            status = %outcome.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Attempt finished"
        );
        outcome
    }

    async fn attempt(
        &self,
        download_id: u64,
        request: &FetchRequest,
        policy: &ChannelPolicy,
    ) -> Outcome {
        let url = request.url.as_str();

        if let Err(e) = tokio::fs::create_dir_all(&request.destination).await {
            tracing::error!(
                download_id,
                path = %request.destination.display(),
                error = %e,
                "Failed to create destination folder"
            );
            return Outcome::failed_with(FailureKind::CreatingFolder, e);
        }

        let parsed = match url::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(download_id, url = %url, error = %e, "Invalid download URL");
                return Outcome::failed_with(FailureKind::Requesting, e);
            }
        };

        // Checked before connecting so blacklisted hosts are never contacted
        if let Some(host) = parsed.host_str()
            && policy.blocks_domain(host)
        {
            return self.skip(request, SkipReason::UnpermittedDomain, host);
        }

        let timeout = policy.timeout.unwrap_or(self.settings.timeout);
        let request_started = Instant::now();
        let response = match self
            .client
            .get(parsed)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, &self.settings.user_agent)
            .header(reqwest::header::ACCEPT_ENCODING, "identity")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_builder() || e.is_connect() {
                    FailureKind::Requesting
                } else {
                    FailureKind::DownloadingResponse
                };
                tracing::error!(download_id, url = %url, error = %e, "Request failed");
                return Outcome::failed_with(kind, e);
            }
        };

        tracing::debug!(
            download_id,
            http_status = response.status().as_u16(),
            elapsed_ms = request_started.elapsed().as_millis() as u64,
            "Response received"
        );
        let download_started = Instant::now();

        let filename = match request.filename.as_deref().filter(|f| !f.is_empty()) {
            Some(name) => name.to_string(),
            None => utils::content_disposition_filename(response.headers())
                .or_else(|| utils::filename_from_url(response.url().as_str()))
                .unwrap_or_default(),
        };

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(download_id, url = %url, error = %e, "Could not read response");
                return Outcome::failed_with(FailureKind::ReadingResponse, e);
            }
        };
        tracing::debug!(
            download_id,
            bytes = body.len(),
            elapsed_ms = download_started.elapsed().as_millis() as u64,
            "Body downloaded"
        );

        let sniffed = classify::sniff(&body);

        let filename = if utils::is_safe_filename(&filename) {
            filename
        } else {
            let mut placeholder = PLACEHOLDER_FILENAME.to_string();
            if let Some(ext) = classify::extension_for_mime(&sniffed.mime) {
                placeholder.push_str(&ext);
            }
            tracing::debug!(download_id, original = %filename, placeholder = %placeholder, "Replacing unsafe filename");
            placeholder
        };

        if !policy.allows(sniffed.class) {
            return self.skip(request, SkipReason::UnpermittedType, sniffed.class.as_str());
        }

        let extension = classify::file_extension(&filename);
        if classify::is_blacklisted_extension(extension, &policy.extension_blacklist) {
            return self.skip(request, SkipReason::UnpermittedExtension, extension);
        }

        // Folder class may differ from the sniffed class; permission was decided above
        let mut folder = request.destination.clone();
        let mut class = sniffed.class;
        if policy.divide_folders_by_type
            && let Some((folder_class, subfolder)) = classify::subfolder_for(sniffed.class, extension)
        {
            folder.push(subfolder);
            class = folder_class;
            if let Err(e) = tokio::fs::create_dir_all(&folder).await {
                tracing::error!(
                    download_id,
                    path = %folder.display(),
                    error = %e,
                    "Failed to create subfolder"
                );
                return Outcome::failed_with(FailureKind::CreatingSubfolder, e);
            }
        }

        let prefix = date_prefix(policy.date_format(&self.settings.filename_date_format));
        let wanted = folder.join(format!("{prefix}{filename}"));
        let Some(path) = utils::unique_path(&wanted, policy.duplicate_filenames) else {
            return self.skip(request, SkipReason::Duplicate, &wanted.display().to_string());
        };
        if path != wanted {
            tracing::info!(
                wanted = %wanted.display(),
                path = %path.display(),
                "Matching filename, saving under a new name"
            );
        }

        let write_started = Instant::now();
        if let Err(e) = write_file(&path, &body).await {
            tracing::error!(download_id, path = %path.display(), error = %e, "Failed to write file");
            return Outcome::failed_with(FailureKind::WritingFile, e);
        }

        let file_time = filetime::FileTime::from_unix_time(
            request.timestamp.timestamp(),
            request.timestamp.timestamp_subsec_nanos(),
        );
        if let Err(e) = filetime::set_file_times(&path, file_time, file_time) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to set file time");
        }
        tracing::debug!(
            download_id,
            elapsed_ms = write_started.elapsed().as_millis() as u64,
            "File written"
        );

        tracing::info!(
            channel_id = %request.channel_id,
            class = %class,
            path = %path.display(),
            "Saved file"
        );

        let record_started = Instant::now();
        let record = DownloadRecord {
            url: request.url.clone(),
            downloaded_at: Utc::now(),
            destination: path.clone(),
            filename,
            channel_id: request.channel_id.clone(),
            user_id: request.user_id.clone(),
        };
        if let Err(e) = self.records.insert(&record).await {
            tracing::error!(download_id, url = %url, error = %e, "Failed to write download record");
            return Outcome::failed_with(FailureKind::WritingRecord, e);
        }
        tracing::debug!(
            download_id,
            elapsed_ms = record_started.elapsed().as_millis() as u64,
            "Record written"
        );

        self.event_tx
            .send(Event::FileSaved {
                channel_id: request.channel_id.clone(),
                url: request.url.clone(),
                path,
                class,
            })
            .ok();

        Outcome::success()
    }

    fn skip(&self, request: &FetchRequest, reason: SkipReason, detail: &str) -> Outcome {
        let outcome = Outcome::skipped(reason);
        tracing::warn!(
            url = %request.url,
            channel_id = %request.channel_id,
            detail = %detail,
            status = %outcome.status,
            "Skipping download"
        );
        self.event_tx
            .send(Event::DownloadSkipped {
                channel_id: request.channel_id.clone(),
                url: request.url.clone(),
                status: outcome.status,
            })
            .ok();
        outcome
    }
}

/// Current local time rendered with a strftime `format`; an invalid format
/// yields no prefix
fn date_prefix(format: &str) -> String {
    let mut prefix = String::new();
    if write!(prefix, "{}", Local::now().format(format)).is_err() {
        tracing::warn!(format = %format, "Invalid filename date format, using no prefix");
        prefix.clear();
    }
    prefix
}

/// Write to a `.part` sibling, then rename it into place
async fn write_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    if let Err(e) = tokio::fs::write(&part, body).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&part, path).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e);
    }
    Ok(())
}
