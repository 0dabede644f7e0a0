//! Error handling for the orchestrator
//!
//! This module defines the top-level error type used throughout the crate.

use thiserror::Error;

use crate::core::transcriber::TranscribeError;
use crate::storage::StoreError;

/// Result type alias for the orchestrator
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (empty credential list, unreadable settings)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A second batch was started while one is active
    #[error("a transcription batch is already running")]
    AlreadyRunning,

    /// Referenced record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation is not legal for the record's current status
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Persistence-boundary failures
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Transcription-service failures
    #[error("transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    /// Settings file IO failures
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file parse failures
    #[error("settings parse error: {0}")]
    SettingsParse(#[from] serde_yaml::Error),
}
