//! Public types of the credential rotation

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::VideoId;
use crate::utils::mask_secret;

/// Rotation state of one credential slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    /// Idle and claimable.
    Available,
    /// Held by exactly one worker.
    Working,
    /// Cooling down after the service reported quota exhaustion.
    RateLimited,
    /// Rejected by the service; out of rotation until operator action.
    Error,
}

/// A claimed credential, handed to exactly one worker at a time
///
/// The worker keeps the lease for the duration of one pipeline run and
/// gives the slot back through the pool (`release`, `mark_rate_limited`
/// or `mark_error`), never by dropping the lease.
#[derive(Clone)]
pub struct CredentialLease {
    /// Stable rotation slot of the credential.
    pub index: usize,
    /// The secret itself, sent with service calls.
    pub secret: String,
}

// Leases end up in tracing output; never print the secret.
impl fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialLease")
            .field("index", &self.index)
            .field("secret", &mask_secret(&self.secret))
            .finish()
    }
}

/// Read-only snapshot of one credential slot, safe to display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub index: usize,
    /// First and last characters of the secret, middle masked.
    pub masked_secret: String,
    pub state: CredentialState,
    pub rate_limited_until: Option<DateTime<Utc>>,
    /// Video currently being processed with this credential, if any.
    pub current_job: Option<VideoId>,
    /// Items completed with this credential over the pool's lifetime.
    pub completed_count: u64,
}
