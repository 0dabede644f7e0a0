//! Persistence boundary of the orchestrator
//!
//! The pipeline only ever talks to these traits. The real application
//! backs them with a database and object storage; tests and the bundled
//! [`MemoryStore`] keep everything in process. The one semantic the
//! backends must honor is that [`VideoStore::try_claim`] is a single
//! atomic compare-and-swap; a read-then-write pair reintroduces the
//! double-processing race it exists to prevent.

pub mod memory;
pub mod types;

pub use memory::MemoryStore;
pub use types::{
    ActivityEntry, SegmentRecord, StoreError, TranscriptRecord, VideoId, VideoRecord, VideoStatus,
};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Video rows: reads, conditional claims, and status writes
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Fetch a video row by id
    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, StoreError>;

    /// Atomically claim a video for transcription
    ///
    /// Performs the equivalent of a conditional update: set status to
    /// `transcribing` where the id matches and the row is either not
    /// currently `transcribing`, or has been `transcribing` longer than
    /// `stale_after` (an abandoned claim). Returns the claimed row, or
    /// `None` when another actor already owns the video.
    async fn try_claim(
        &self,
        id: VideoId,
        stale_after: Duration,
    ) -> Result<Option<VideoRecord>, StoreError>;

    /// Write a new status (and optional error text) onto a video row,
    /// bumping `updated_at`
    async fn update_status(
        &self,
        id: VideoId,
        status: VideoStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError>;
}

/// Transcription rows, replaced wholesale per video
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Delete every transcription row for a video, returning how many
    /// were removed
    async fn delete_for_video(&self, video_id: VideoId) -> Result<u64, StoreError>;

    /// Insert one transcription row
    async fn insert(&self, record: TranscriptRecord) -> Result<(), StoreError>;

    /// All transcription rows for a video
    async fn find_by_video(&self, video_id: VideoId) -> Result<Vec<TranscriptRecord>, StoreError>;
}

/// Source media retrieval
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Download the media bytes at `path`
    async fn fetch(&self, path: &str) -> Result<Bytes, StoreError>;
}

/// Fire-and-forget activity logging; failures are swallowed by the
/// implementation and never reach the pipeline
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(&self, entry: ActivityEntry);
}
