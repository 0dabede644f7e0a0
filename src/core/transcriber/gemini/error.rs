//! Maps Gemini HTTP failures onto [`TranscribeError`]
//!
//! Quota exhaustion arrives as HTTP 429 or as a `RESOURCE_EXHAUSTED`
//! status in the error body, optionally carrying a `RetryInfo` detail
//! with a suggested delay.

use std::time::Duration;

use serde_json::Value;

use crate::core::transcriber::error::TranscribeError;

pub struct GeminiErrorMapper;

impl GeminiErrorMapper {
    pub fn from_http_status(status: u16, body: &str) -> TranscribeError {
        let (message, api_status) = Self::parse_error_body(body).unwrap_or_default();
        let message = if message.is_empty() {
            body.trim().to_string()
        } else {
            message
        };

        if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
            return TranscribeError::RateLimited {
                message,
                retry_after: Self::extract_retry_after(body),
            };
        }

        match status {
            400 => TranscribeError::InvalidRequest(message),
            401 | 403 => {
                if message.is_empty() {
                    TranscribeError::Authentication("invalid or missing API key".to_string())
                } else {
                    TranscribeError::Authentication(message)
                }
            }
            404 => TranscribeError::InvalidRequest(format!("model or endpoint not found: {}", message)),
            _ => TranscribeError::Api { status, message },
        }
    }

    /// `message` and `status` fields of a Google error body, when the
    /// body is one
    fn parse_error_body(body: &str) -> Option<(String, String)> {
        let json: Value = serde_json::from_str(body).ok()?;
        let error = json.get("error")?;
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();
        let status = error
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("")
            .to_string();
        Some((message, status))
    }

    /// Server-suggested retry delay, from either a bare `retry_after`
    /// field or a `RetryInfo` entry in `error.details`
    fn extract_retry_after(body: &str) -> Option<Duration> {
        let json: Value = serde_json::from_str(body).ok()?;
        let error = json.get("error")?;

        if let Some(secs) = error.get("retry_after").and_then(|v| v.as_u64()) {
            return Some(Duration::from_secs(secs));
        }

        for detail in error.get("details")?.as_array()? {
            if let Some(delay) = detail.get("retryDelay").and_then(|v| v.as_str()) {
                return Self::parse_retry_delay(delay);
            }
        }

        None
    }

    /// Parses the `RetryInfo` duration format, e.g. `"21s"` or `"3.5s"`
    fn parse_retry_delay(delay: &str) -> Option<Duration> {
        let secs: f64 = delay.strip_suffix('s')?.parse().ok()?;
        if secs.is_finite() && secs >= 0.0 {
            Some(Duration::from_secs_f64(secs))
        } else {
            None
        }
    }
}
