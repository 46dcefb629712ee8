//! Error types for the Amplify log archiver

use thiserror::Error;

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Error types that can occur while fetching and storing access logs
#[derive(Error, Debug, Clone)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The log API refused the window because it holds too many records.
    ///
    /// This is a control signal for bisection, not a failure.
    #[error("Log API requested a smaller time range: {0}")]
    RangeTooLarge(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Log API throttled the request: {0}")]
    Throttled(String),

    #[error("Log API returned 5xx error: {status} - {message}")]
    UpstreamServer { status: u16, message: String },

    #[error("Log API returned 4xx error: {status} - {message}")]
    UpstreamClient { status: u16, message: String },

    #[error("Malformed log API response: {0}")]
    MalformedResponse(String),

    #[error("Log download returned HTTP {status}")]
    PayloadDownload { status: u16 },

    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object store rejected upload: {status} - {message}")]
    StorageRejected { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        ArchiveError::Serialization(err.to_string())
    }
}

impl ArchiveError {
    /// Determine if this error should trigger a retry of the same range
    ///
    /// Transient conditions (transport failures, timeouts, throttling, 5xx,
    /// unreadable responses and failed payload downloads) are retried.
    /// `RangeTooLarge` is never retried: it is answered by splitting.
    pub fn should_retry(&self) -> bool {
        match self {
            ArchiveError::Network(_) => true,
            ArchiveError::Timeout(_) => true,
            ArchiveError::Throttled(_) => true,
            ArchiveError::UpstreamServer { .. } => true,
            ArchiveError::MalformedResponse(_) => true,
            ArchiveError::PayloadDownload { .. } => true,
            ArchiveError::Storage(_) => true,
            ArchiveError::Io(_) => true,

            ArchiveError::RangeTooLarge(_) => false,
            ArchiveError::UpstreamClient { .. } => false,
            ArchiveError::StorageRejected { .. } => false,
            ArchiveError::ConfigError(_) => false,
            ArchiveError::InvalidRange(_) => false,
            ArchiveError::Serialization(_) => false,
        }
    }

    /// Whether this error is the log API's "range too large" signal
    pub fn is_range_too_large(&self) -> bool {
        matches!(self, ArchiveError::RangeTooLarge(_))
    }

    /// Create an error from an HTTP status code returned by the log API
    ///
    /// 429 is treated as throttling, other 4xx as client errors and 5xx as
    /// server errors. The range-too-large signal is recognised separately by
    /// the log source before this is called.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 {
            ArchiveError::Throttled(message)
        } else if (400..500).contains(&status) {
            ArchiveError::UpstreamClient { status, message }
        } else if (500..600).contains(&status) {
            ArchiveError::UpstreamServer { status, message }
        } else {
            ArchiveError::MalformedResponse(format!("HTTP {}: {}", status, message))
        }
    }
}

impl From<reqwest::Error> for ArchiveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ArchiveError::Timeout(err.to_string())
        } else if err.is_decode() {
            ArchiveError::MalformedResponse(err.to_string())
        } else {
            ArchiveError::Network(err.to_string())
        }
    }
}
