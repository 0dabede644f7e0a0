//! Logging helpers

pub mod sanitize;

pub use sanitize::{mask_secret, redact_credentials, sanitize_error_text, MAX_ERROR_LEN};
