//! Request and response types for the transcription service boundary

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One transcription request
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    /// Raw media bytes, sent inline to the service.
    pub media: Bytes,
    /// MIME type of `media`, e.g. `video/mp4`.
    pub mime_type: String,
    /// Model identifier to transcribe with.
    pub model: String,
    /// Expected language of the speech, as a hint to the model.
    pub language: String,
}

/// One time-coded span of transcribed speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub start_secs: f64,
    #[serde(default)]
    pub end_secs: f64,
    pub text: String,
}

/// A transcription result returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub full_text: String,
    pub language: String,
    /// Time-coded segments; may be empty when the service produced
    /// plain text only.
    #[serde(default)]
    pub segments: Vec<Segment>,
}
