//! Configuration for the batch transcription orchestrator
//!
//! Settings come from a YAML file, from environment variables, or from
//! defaults. Credentials are never logged; use
//! [`crate::utils::mask_secret`] when displaying them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::error::{Error, Result};

/// Environment variable holding a comma separated list of API keys.
pub const ENV_API_KEYS: &str = "GEMINI_API_KEYS";
/// Fallback environment variable holding a single API key.
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable overriding the transcription model.
pub const ENV_MODEL: &str = "GEMINI_MODEL";
/// Environment variable overriding the transcript language hint.
pub const ENV_LANGUAGE: &str = "TRANSCRIBE_LANGUAGE";

/// Main configuration struct for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// API credentials shared by the worker pool, in rotation order.
    #[serde(default)]
    pub credentials: Vec<String>,

    /// Model identifier sent with every transcription request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Language hint passed to the transcription service.
    #[serde(default = "default_language")]
    pub language: String,

    /// How long a rate limited credential stays out of rotation.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Age after which an in-flight claim on a video is considered
    /// abandoned and may be reclaimed by another worker.
    #[serde(default = "default_stale_claim_secs")]
    pub stale_claim_secs: u64,

    /// Interval between cosmetic progress updates while a service call
    /// is outstanding.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Timeout for a single transcription request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_stale_claim_secs() -> u64 {
    300
}

fn default_heartbeat_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials: Vec::new(),
            model: default_model(),
            language: default_language(),
            cooldown_secs: default_cooldown_secs(),
            stale_claim_secs: default_stale_claim_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading settings from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Configuration(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;

        debug!("Settings loaded successfully");
        Ok(settings)
    }

    /// Load settings from environment variables
    ///
    /// Reads `GEMINI_API_KEYS` (comma separated) with `GEMINI_API_KEY`
    /// as a single-key fallback, plus optional model and language
    /// overrides. A `.env` file in the working directory is honored.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        info!("Loading settings from environment variables");

        let credentials = match std::env::var(ENV_API_KEYS) {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => std::env::var(ENV_API_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(|k| vec![k.trim().to_string()])
                .unwrap_or_default(),
        };

        let mut settings = Settings {
            credentials,
            ..Settings::default()
        };

        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.trim().is_empty() {
                settings.model = model.trim().to_string();
            }
        }
        if let Ok(language) = std::env::var(ENV_LANGUAGE) {
            if !language.trim().is_empty() {
                settings.language = language.trim().to_string();
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        debug!("Validating settings");

        if self.credentials.is_empty() {
            return Err(Error::Configuration(
                "no API credentials configured".to_string(),
            ));
        }
        if self.credentials.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::Configuration(
                "API credential list contains an empty entry".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Configuration("model must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_secs == 0 {
            return Err(Error::Configuration(
                "heartbeat_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Cooldown applied to a rate limited credential
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Staleness threshold for reclaiming an abandoned claim
    pub fn stale_claim_window(&self) -> Duration {
        Duration::from_secs(self.stale_claim_secs)
    }

    /// Interval between heartbeat progress updates
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// Timeout for one transcription request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
