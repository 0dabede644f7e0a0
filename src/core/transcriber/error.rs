//! Error taxonomy of the transcription service boundary
//!
//! Rate limiting is a structured variant, not a message pattern: the
//! worker decides between cooldown-and-requeue and a terminal failure
//! by matching on [`TranscribeError::RateLimited`], never by sniffing
//! error text.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscribeError {
    /// The service refused the request because the credential's quota
    /// is exhausted. Recoverable: cool the credential down and retry
    /// the item.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        /// Server-suggested wait, when the response carried one.
        retry_after: Option<Duration>,
    },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unusable response: {0}")]
    Parse(String),
}

impl TranscribeError {
    /// Whether this failure should cool the credential down and
    /// requeue the item instead of failing it
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TranscribeError::RateLimited { .. })
    }

    /// Server-suggested wait before retrying, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TranscribeError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
