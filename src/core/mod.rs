//! Core orchestration: credential rotation, the transcription service
//! boundary, and the concurrent batch pipeline

pub mod batch;
pub mod credentials;
pub mod transcriber;
