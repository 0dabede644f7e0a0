//! # Batchscribe
//!
//! Concurrent batch transcription over a small set of rate-limited API
//! credentials.
//!
//! ## Features
//!
//! - **Bounded worker pool**: exactly one worker per configured
//!   credential, sharing a FIFO queue of video ids
//! - **Rate limit recovery**: a throttled credential cools down while
//!   the item returns to the head of the queue, so no work is lost
//! - **No double processing**: an optimistic claim at the persistence
//!   boundary keeps concurrent actors off the same video, including
//!   actors outside this process
//! - **Live progress**: per-item stages, throughput and ETA pushed to a
//!   callback after every state change
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use batchscribe::{
//!     BatchOrchestrator, Collaborators, GeminiTranscriber, MemoryStore, ProgressCallback,
//!     Settings, VideoRecord,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let video_id = uuid::Uuid::new_v4();
//!     store
//!         .insert_video(VideoRecord::new(video_id, "intro.mp4", "media/intro.mp4", "video/mp4"))
//!         .await;
//!     store
//!         .put_media("media/intro.mp4", bytes::Bytes::from_static(b"..."))
//!         .await;
//!
//!     let transcriber = Arc::new(GeminiTranscriber::new(settings.request_timeout())?);
//!     let deps = Collaborators {
//!         videos: store.clone(),
//!         transcripts: store.clone(),
//!         media: store.clone(),
//!         activity: store.clone(),
//!         transcriber,
//!     };
//!
//!     let on_progress: ProgressCallback = Arc::new(|snapshot| {
//!         println!("{}/{} done", snapshot.completed, snapshot.total);
//!     });
//!
//!     let orchestrator = BatchOrchestrator::new(settings, deps);
//!     let handle = orchestrator.start(vec![video_id], Some(on_progress)).await?;
//!     let summary = handle.wait().await;
//!     println!("{} completed, {} errors", summary.completed, summary.errors);
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod storage;
pub mod utils;

// Re-export the main types
pub use config::Settings;
pub use utils::error::{Error, Result};

pub use core::batch::{
    BatchHandle, BatchOrchestrator, BatchSnapshot, Collaborators, KeyVerification,
    ProgressCallback, Stage, VideoProgress,
};
pub use core::credentials::{CredentialLease, CredentialPool, CredentialState, CredentialStatus};
pub use core::transcriber::{
    GeminiTranscriber, Segment, TranscribeError, TranscribeRequest, Transcriber, Transcript,
};
pub use storage::{
    ActivityEntry, ActivityLog, MediaStore, MemoryStore, SegmentRecord, StoreError,
    TranscriptRecord, TranscriptStore, VideoId, VideoRecord, VideoStatus, VideoStore,
};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
