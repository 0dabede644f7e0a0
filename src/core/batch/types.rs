//! Progress types surfaced to the caller

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::credentials::CredentialStatus;
use crate::storage::VideoId;

/// Pipeline position of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Downloading,
    Preparing,
    Transcribing,
    Saving,
    Completed,
    Error,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Queued => "queued",
            Stage::Downloading => "downloading",
            Stage::Preparing => "preparing",
            Stage::Transcribing => "transcribing",
            Stage::Saving => "saving",
            Stage::Completed => "completed",
            Stage::Error => "error",
        }
    }
}

/// Live progress of one submitted video
///
/// Created in `queued` when the batch starts, mutated by whichever
/// worker currently owns the video, never removed from the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProgress {
    pub video_id: VideoId,
    /// Display name; stays empty when the preload lookup failed.
    pub title: String,
    pub stage: Stage,
    /// Free-text progress detail, e.g. download size or elapsed time.
    pub detail: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Sanitized failure text when `stage` is `error`.
    pub error: Option<String>,
    /// Rotation slot of the credential processing this item, if any.
    pub credential_index: Option<usize>,
}

impl VideoProgress {
    pub fn queued(video_id: VideoId) -> Self {
        Self {
            video_id,
            title: String::new(),
            stage: Stage::Queued,
            detail: String::new(),
            started_at: None,
            completed_at: None,
            error: None,
            credential_index: None,
        }
    }
}

/// Immutable copy of the batch state handed to the progress callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSnapshot {
    /// Number of distinct videos submitted.
    pub total: usize,
    /// Terminal successes, including items skipped as already owned.
    pub completed: usize,
    pub errors: usize,
    pub active_workers: usize,
    pub is_running: bool,
    pub is_cancelled: bool,
    /// Per-item progress in submission order.
    pub items: Vec<VideoProgress>,
    pub key_statuses: Vec<CredentialStatus>,
    /// Observed seconds per completed video; `None` before the first
    /// completion.
    pub avg_secs_per_video: Option<f64>,
    /// Estimated seconds until the batch drains; `None` before the
    /// first completion and once nothing remains.
    pub eta_secs: Option<u64>,
}

impl BatchSnapshot {
    /// Items not yet in a terminal stage
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed + self.errors)
    }
}

/// Callback fired with a fresh snapshot after every state change
///
/// Runs inline on worker tasks; keep it cheap and non-blocking.
pub type ProgressCallback = Arc<dyn Fn(BatchSnapshot) + Send + Sync>;
