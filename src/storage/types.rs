//! Records exchanged with the persistence collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identity of a video row in the persistent store.
pub type VideoId = Uuid;

/// Errors surfaced by the storage collaborators
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("video not found: {0}")]
    VideoNotFound(VideoId),

    #[error("media not found: {0}")]
    MediaNotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persisted lifecycle status of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Uploaded,
    Transcribing,
    Transcribed,
    Error,
    Archived,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Transcribing => "transcribing",
            VideoStatus::Transcribed => "transcribed",
            VideoStatus::Error => "error",
            VideoStatus::Archived => "archived",
        }
    }
}

/// A video row as seen by the orchestrator
///
/// `updated_at` doubles as the staleness marker for claim recovery: a
/// row stuck in [`VideoStatus::Transcribing`] whose `updated_at` is
/// older than the stale-claim window may be reclaimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: VideoId,
    pub title: String,
    /// Location of the source media, resolvable by the media collaborator.
    pub file_path: String,
    pub mime_type: String,
    pub status: VideoStatus,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// New record in the initial uploaded state
    pub fn new(
        id: VideoId,
        title: impl Into<String>,
        file_path: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            file_path: file_path.into(),
            mime_type: mime_type.into(),
            status: VideoStatus::Uploaded,
            error_message: None,
            updated_at: Utc::now(),
        }
    }
}

/// One time-coded span of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Offset of the span start from the beginning of the media, seconds.
    pub start_secs: f64,
    /// Offset of the span end, seconds.
    pub end_secs: f64,
    pub text: String,
}

/// A persisted transcription result
///
/// Results are replaced wholesale on every successful run: existing rows
/// for the video are deleted before the new row is inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: Uuid,
    pub video_id: VideoId,
    pub full_text: String,
    pub language: String,
    pub segments: Vec<SegmentRecord>,
    /// Model identifier the result was produced with.
    pub model: String,
    /// Wall-clock duration of the service call, seconds.
    pub processing_time_secs: f64,
    pub created_at: DateTime<Utc>,
}

/// One fire-and-forget activity log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub video_id: VideoId,
    pub operation: String,
    pub status: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        video_id: VideoId,
        operation: impl Into<String>,
        status: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            video_id,
            operation: operation.into(),
            status: status.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}
