//! Credential rotation with cooldown-based rate limit recovery
//!
//! One slot per configured API key. Acquisition sweeps expired cooldowns
//! and claims the first available slot in a single critical section, so
//! two workers can never hold the same slot.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::storage::VideoId;
use crate::utils::error::{Error, Result};
use crate::utils::mask_secret;

use super::types::{CredentialLease, CredentialState, CredentialStatus};

/// Added to every cooldown wait so the sweep runs strictly after the
/// earliest expiry.
const WAIT_BUFFER: Duration = Duration::from_millis(250);

struct Slot {
    index: usize,
    secret: String,
    state: CredentialState,
    rate_limited_until: Option<DateTime<Utc>>,
    current_job: Option<VideoId>,
    completed_count: u64,
}

impl Slot {
    fn new(index: usize, secret: String) -> Self {
        Self {
            index,
            secret,
            state: CredentialState::Available,
            rate_limited_until: None,
            current_job: None,
            completed_count: 0,
        }
    }

    fn cooldown_expired(&self, now: DateTime<Utc>) -> bool {
        self.rate_limited_until.map(|t| t <= now).unwrap_or(true)
    }
}

/// Rotation manager for the shared API credentials
pub struct CredentialPool {
    slots: Mutex<Vec<Slot>>,
    model: String,
    cooldown: Duration,
    count: usize,
}

impl CredentialPool {
    /// Build the pool from settings, one slot per credential
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.credentials.is_empty() {
            return Err(Error::Configuration(
                "no API credentials configured".to_string(),
            ));
        }

        let slots: Vec<Slot> = settings
            .credentials
            .iter()
            .enumerate()
            .map(|(index, secret)| Slot::new(index, secret.clone()))
            .collect();
        let count = slots.len();

        debug!(credentials = count, model = %settings.model, "credential pool initialized");

        Ok(Self {
            slots: Mutex::new(slots),
            model: settings.model.clone(),
            cooldown: settings.cooldown(),
            count,
        })
    }

    /// Model identifier shared by every worker
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of configured credentials; fixed for the pool's lifetime
    pub fn credential_count(&self) -> usize {
        self.count
    }

    /// Claim the first available credential for `job`
    ///
    /// Sweeps slots whose cooldown has elapsed back to available before
    /// searching. The sweep, the check and the flip to `working` happen
    /// under one lock; callers either get a lease no other worker holds
    /// or `None`.
    pub async fn acquire(&self, job: VideoId) -> Option<CredentialLease> {
        let mut slots = self.slots.lock().await;
        let now = Utc::now();

        for slot in slots.iter_mut() {
            if slot.state == CredentialState::RateLimited && slot.cooldown_expired(now) {
                debug!(credential = slot.index, "cooldown elapsed, credential back in rotation");
                slot.state = CredentialState::Available;
                slot.rate_limited_until = None;
            }
        }

        let slot = slots
            .iter_mut()
            .find(|s| s.state == CredentialState::Available)?;

        slot.state = CredentialState::Working;
        slot.current_job = Some(job);
        debug!(credential = slot.index, job = %job, "credential acquired");

        Some(CredentialLease {
            index: slot.index,
            secret: slot.secret.clone(),
        })
    }

    /// Return a working credential to rotation after a finished item
    ///
    /// No-op on an unknown index or a slot that is not working.
    pub async fn release(&self, index: usize) {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(index) else {
            return;
        };
        if slot.state != CredentialState::Working {
            return;
        }

        slot.state = CredentialState::Available;
        slot.current_job = None;
        slot.completed_count += 1;
        debug!(credential = index, completed = slot.completed_count, "credential released");
    }

    /// Cool a credential down after the service reported quota
    /// exhaustion
    ///
    /// The slot stays in rotation and is swept back to available once
    /// the cooldown elapses. `cooldown` overrides the configured
    /// default, e.g. with a server-suggested retry delay.
    pub async fn mark_rate_limited(&self, index: usize, cooldown: Option<Duration>) {
        let cooldown = cooldown.unwrap_or(self.cooldown);
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(index) else {
            return;
        };

        slot.state = CredentialState::RateLimited;
        slot.rate_limited_until = Some(Utc::now() + to_chrono(cooldown));
        slot.current_job = None;
        warn!(
            credential = index,
            cooldown_secs = cooldown.as_secs(),
            "credential rate limited, cooling down"
        );
    }

    /// Take a credential out of rotation after the service rejected it
    ///
    /// Terminal: errored slots are never swept back automatically.
    pub async fn mark_error(&self, index: usize) {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(index) else {
            return;
        };

        slot.state = CredentialState::Error;
        slot.current_job = None;
        slot.rate_limited_until = None;
        warn!(credential = index, "credential rejected by service, out of rotation");
    }

    /// Whether rotation can still make progress: a slot is viable when
    /// it is free, cooling down, or held by a worker that will release
    /// it. Only errored slots are written off.
    pub async fn has_available_or_cooling(&self) -> bool {
        let slots = self.slots.lock().await;
        slots.iter().any(|s| s.state != CredentialState::Error)
    }

    /// Sleep until the earliest cooldown expires
    ///
    /// Returns `false` immediately when nothing is cooling; returns
    /// `true` after sleeping, at which point the caller re-attempts
    /// acquisition (success is not guaranteed, another worker may win
    /// the sweep).
    pub async fn wait_for_available(&self) -> bool {
        let earliest = {
            let slots = self.slots.lock().await;
            slots
                .iter()
                .filter(|s| s.state == CredentialState::RateLimited)
                .filter_map(|s| s.rate_limited_until)
                .min()
        };

        let Some(until) = earliest else {
            return false;
        };

        let wait = until
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            + WAIT_BUFFER;

        debug!(wait_ms = wait.as_millis() as u64, "waiting out credential cooldown");
        tokio::time::sleep(wait).await;
        true
    }

    /// Read-only snapshot of every slot for display
    pub async fn statuses(&self) -> Vec<CredentialStatus> {
        let slots = self.slots.lock().await;
        slots
            .iter()
            .map(|s| CredentialStatus {
                index: s.index,
                masked_secret: mask_secret(&s.secret),
                state: s.state,
                rate_limited_until: s.rate_limited_until,
                current_job: s.current_job,
                completed_count: s.completed_count,
            })
            .collect()
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(d.as_millis().min(i64::MAX as u128) as i64)
}
