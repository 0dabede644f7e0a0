//! Transcription service boundary
//!
//! [`Transcriber`] is the seam the worker pipeline calls through; the
//! bundled [`GeminiTranscriber`] is the production implementation and
//! tests substitute scripted fakes. Implementations must report quota
//! exhaustion as [`TranscribeError::RateLimited`] so the pipeline can
//! cool the credential down and requeue the item.

pub mod error;
pub mod gemini;
pub mod types;

pub use error::TranscribeError;
pub use gemini::GeminiTranscriber;
pub use types::{Segment, TranscribeRequest, Transcript};

use async_trait::async_trait;

/// The transcription service as seen by the worker pipeline
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one media item using the given credential
    async fn transcribe(
        &self,
        request: &TranscribeRequest,
        credential: &str,
    ) -> Result<Transcript, TranscribeError>;

    /// Cheaply check whether a credential is accepted by the service
    async fn verify_key(&self, credential: &str) -> Result<(), TranscribeError>;
}
