//! Centralized error types for lookout.
//!
//! Every variant maps to a stable categorical tag (see [`LookoutError::tag`])
//! that is attached to the log record when the error is reported.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the lookout library.
#[derive(Error, Debug)]
pub enum LookoutError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required setting is missing or unusable.
    #[error("Invalid config option {option}: {reason}")]
    InvalidConfig { option: &'static str, reason: String },

    /// The configuration file exists but could not be read or parsed.
    #[error("Invalid config file '{path}': {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    /// The document is not a structured mail message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A `Content-Type` value could not be parsed.
    #[error("Invalid media type '{value}': {reason}")]
    InvalidMediaType { value: String, reason: String },

    /// The multipart structure is broken (boundary, part headers, framing).
    #[error("Invalid multipart part: {0}")]
    InvalidPart(String),

    /// A selected part could not be decoded.
    #[error("Failed to read part: {0}")]
    PartRead(String),

    /// The filesystem watcher could not be created or registered.
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// One of the watcher channels closed; the watch loop cannot continue.
    #[error("Watcher channel '{channel}' closed unexpectedly")]
    WatcherClosed { channel: &'static str },

    /// The webhook delivery failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Failures of a single webhook delivery, one variant per stage.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to create request: {0}")]
    BuildRequest(#[source] reqwest::Error),

    #[error("Failed to send request: {0}")]
    Send(#[source] reqwest::Error),

    #[error("Webhook responded with {code}: {message}")]
    BadStatus { code: u16, message: String },

    #[error("Failed to read response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    #[error("Failed to parse response body: {source}")]
    ParseBody {
        source: serde_json::Error,
        body: String,
    },
}

/// Convenience alias for `Result<T, LookoutError>`.
pub type Result<T> = std::result::Result<T, LookoutError>;

impl LookoutError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Categorical tag used in log records for this error.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Io { .. } => "open_failed",
            Self::InvalidConfig { .. } | Self::ConfigFile { .. } => "invalid_config",
            Self::MalformedMessage(_) => "message_read_failed",
            Self::InvalidMediaType { .. } => "media_type_invalid",
            Self::InvalidPart(_) => "part_invalid",
            Self::PartRead(_) => "part_read_failed",
            Self::Watcher(_) => "watcher_failed",
            Self::WatcherClosed { .. } => "watcher_closed",
            Self::Delivery(e) => e.tag(),
        }
    }
}

impl DeliveryError {
    /// Categorical tag used in log records for this delivery stage.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Serialize(_) => "failed_marshal",
            Self::BuildRequest(_) => "failed_create_request",
            Self::Send(_) => "failed_send_request",
            Self::BadStatus { .. } => "bad_response_code",
            Self::ReadBody(_) => "failed_read_body",
            Self::ParseBody { .. } => "failed_unmarshal_body",
        }
    }
}
