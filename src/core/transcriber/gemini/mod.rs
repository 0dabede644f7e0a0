//! Gemini adapter for the transcription service boundary

pub mod client;
pub mod error;
pub mod models;

pub use client::{GeminiTranscriber, DEFAULT_BASE_URL};
pub use error::GeminiErrorMapper;
