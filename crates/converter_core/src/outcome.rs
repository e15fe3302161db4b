use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity of a pool worker. Diagnostic only, and used to derive scratch paths.
pub type WorkerId = usize;

/// Terminal failure kinds for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    DownloadFailed,
    ConversionFailed,
    CopyFailed,
    UploadFailed,
    ProcessingError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::DownloadFailed,
        ErrorKind::ConversionFailed,
        ErrorKind::CopyFailed,
        ErrorKind::UploadFailed,
        ErrorKind::ProcessingError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorKind::ConversionFailed => "CONVERSION_FAILED",
            ErrorKind::CopyFailed => "COPY_FAILED",
            ErrorKind::UploadFailed => "UPLOAD_FAILED",
            ErrorKind::ProcessingError => "PROCESSING_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error kind `{0}`")]
pub struct ParseErrorKindError(pub String);

impl FromStr for ErrorKind {
    type Err = ParseErrorKindError;

    /// Accepts `DOWNLOAD_FAILED`, `download_failed` and `download-failed`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseErrorKindError(s.to_string()))
    }
}

/// Terminal result for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub item_id: String,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub size_bytes: u64,
    pub worker_id: WorkerId,
}

impl ProcessingOutcome {
    pub fn succeeded(item_id: impl Into<String>, size_bytes: u64, worker_id: WorkerId) -> Self {
        Self {
            item_id: item_id.into(),
            success: true,
            error_kind: None,
            error_message: None,
            size_bytes,
            worker_id,
        }
    }

    pub fn failed(
        item_id: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        size_bytes: u64,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            success: false,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            size_bytes,
            worker_id,
        }
    }
}
