use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

use crate::models::temp_file::TempLogFile;

/// Every failure the recorder pipeline can surface.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("must be a valid timestamp (2006-01-02 15:04:05.000 UTC), input: `{input}`, error: {reason}")]
    InvalidTimestamp { input: String, reason: String },
    #[error("invalid input for --{0} flag: a timestamp is required")]
    MissingTimestamp(&'static str),
    #[error("start is after finish, start: {start}, finish: {finish}")]
    StartAfterFinish { start: String, finish: String },
    #[error("start is not within the 7 day retention interval, start: {start}, interval: {limit}")]
    OutsideRetention { start: String, limit: String },
    #[error("the date provided is not in UTC timezone, date: {0}")]
    NotUtc(String),
    #[error("unable to create a snapshot from past data")]
    SnapshotInPast,
    #[error("unable to find the date time for: {0}")]
    NoDateInFileName(String),
    #[error("you must provide the bucket identifier")]
    MissingBucket,
    #[error("no bucket found with name: {0}")]
    BucketNotFound(String),
    #[error("the aws credentials are not valid: {0}")]
    Credentials(String),
    #[error("{operation} failed: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} returned an incomplete response: {detail}")]
    IncompleteResponse {
        operation: &'static str,
        detail: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),
}

pub type RecorderResult<T> = Result<T, RecorderError>;

impl RecorderError {
    /// Wrap an SDK failure, keeping the full error chain in the message.
    pub fn provider(operation: &'static str, err: impl fmt::Display) -> Self {
        Self::Provider {
            operation,
            message: err.to_string(),
        }
    }
}

/// A failed log download. The partially written artifact travels with the
/// error so the caller can inspect it before it is dropped and removed.
#[derive(Debug, Error)]
#[error("unable to download log file `{file_name}`: {source}")]
pub struct DownloadError {
    pub file_name: String,
    pub partial: Option<TempLogFile>,
    #[source]
    pub source: RecorderError,
}

/// A lightweight wrapper for HTTP-facing errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<RecorderError> for AppError {
    fn from(err: RecorderError) -> Self {
        AppError::internal(err.to_string())
    }
}
