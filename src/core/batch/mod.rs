//! Concurrent batch transcription
//!
//! A bounded worker pool (one worker per credential) drains a shared
//! FIFO queue of video ids. Each item runs a download → prepare →
//! transcribe → save pipeline guarded by an optimistic claim at the
//! persistence boundary, and every state change pushes a fresh snapshot
//! to the caller.

pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod state;
pub mod types;
pub mod worker;

pub use orchestrator::{BatchHandle, BatchOrchestrator, KeyVerification};
pub use state::BatchState;
pub use types::{BatchSnapshot, ProgressCallback, Stage, VideoProgress};

use std::sync::Arc;

use crate::core::transcriber::Transcriber;
use crate::storage::{ActivityLog, MediaStore, TranscriptStore, VideoStore};

/// The external collaborators a batch works against
#[derive(Clone)]
pub struct Collaborators {
    pub videos: Arc<dyn VideoStore>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub media: Arc<dyn MediaStore>,
    pub activity: Arc<dyn ActivityLog>,
    pub transcriber: Arc<dyn Transcriber>,
}
