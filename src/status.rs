//! Download outcome vocabulary shared by the fetch, retry and history layers.
//!
//! Every attempt ends in exactly one [`Outcome`]. Successes and policy skips are
//! terminal; failures are retryable. Retrying is decided by
//! [`DownloadStatus::is_retryable`], never by comparing numeric codes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::retry::IsRetryable;

/// Why a download was intentionally not performed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Target path already exists and the channel does not keep duplicates
    Duplicate,
    /// Host is on the channel's domain blacklist
    UnpermittedDomain,
    /// Sniffed content class is not enabled for the channel
    UnpermittedType,
    /// File extension is blacklisted
    UnpermittedExtension,
}

/// Which step of an attempt failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unspecified failure (unregistered channel, zero attempts allowed)
    Generic,
    /// Destination root could not be created
    CreatingFolder,
    /// Request could not be sent (invalid URL, connection refused)
    Requesting,
    /// Connection was made but no response arrived (timeout, reset)
    DownloadingResponse,
    /// Response body could not be read
    ReadingResponse,
    /// Per-type subfolder could not be created
    CreatingSubfolder,
    /// File could not be written
    WritingFile,
    /// File was written but the download record was not
    WritingRecord,
}

/// Status of a single download attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum DownloadStatus {
    /// File saved and recorded
    Success,
    /// Policy decision, not retried
    Skipped(SkipReason),
    /// Attempt failed, eligible for retry
    Failed(FailureKind),
}

impl DownloadStatus {
    /// True for failures; successes and skips stop the retry loop
    pub fn is_retryable(&self) -> bool {
        matches!(self, DownloadStatus::Failed(_))
    }

    /// True only for [`DownloadStatus::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadStatus::Success)
    }

    /// Human-readable label used in logs and failure notices
    pub fn description(&self) -> &'static str {
        match self {
            DownloadStatus::Success => "Download Succeeded",
            DownloadStatus::Skipped(SkipReason::Duplicate) => "Download Skipped - Duplicate",
            DownloadStatus::Skipped(SkipReason::UnpermittedDomain) => {
                "Download Skipped - Unpermitted Domain"
            }
            DownloadStatus::Skipped(SkipReason::UnpermittedType) => {
                "Download Skipped - Unpermitted File Type"
            }
            DownloadStatus::Skipped(SkipReason::UnpermittedExtension) => {
                "Download Skipped - Unpermitted File Extension"
            }
            DownloadStatus::Failed(FailureKind::Generic) => "Download Failed",
            DownloadStatus::Failed(FailureKind::CreatingFolder) => {
                "Download Failed - Error Creating Folder"
            }
            DownloadStatus::Failed(FailureKind::Requesting) => {
                "Download Failed - Error Requesting URL Data"
            }
            DownloadStatus::Failed(FailureKind::DownloadingResponse) => {
                "Download Failed - Error Downloading URL Response"
            }
            DownloadStatus::Failed(FailureKind::ReadingResponse) => {
                "Download Failed - Error Reading URL Response"
            }
            DownloadStatus::Failed(FailureKind::CreatingSubfolder) => {
                "Download Failed - Error Creating Subfolder for Type"
            }
            DownloadStatus::Failed(FailureKind::WritingFile) => {
                "Download Failed - Error Writing File"
            }
            DownloadStatus::Failed(FailureKind::WritingRecord) => {
                "Download Failed - Error Writing to Database"
            }
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Result of one attempt: the status plus the underlying error text, if any
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// What happened
    pub status: DownloadStatus,
    /// Underlying error message for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    /// Successful download
    pub fn success() -> Self {
        Self {
            status: DownloadStatus::Success,
            error: None,
        }
    }

    /// Intentional skip
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            status: DownloadStatus::Skipped(reason),
            error: None,
        }
    }

    /// Failure without an underlying error
    pub fn failed(kind: FailureKind) -> Self {
        Self {
            status: DownloadStatus::Failed(kind),
            error: None,
        }
    }

    /// Failure carrying the error that caused it
    pub fn failed_with(kind: FailureKind, error: impl fmt::Display) -> Self {
        Self {
            status: DownloadStatus::Failed(kind),
            error: Some(error.to_string()),
        }
    }

    /// See [`DownloadStatus::is_success`]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl IsRetryable for Outcome {
    fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: {}", self.status, error),
            None => write!(f, "{}", self.status),
        }
    }
}
