//! Worker: one cooperative task per credential slot
//!
//! Pulls video ids off the shared queue, leases a credential, and runs
//! the per-item pipeline. Rate limits cool the credential and push the
//! item back to the head of the queue, a rejected credential is
//! disabled and the item retried elsewhere, and every other failure is
//! terminal for the item but never for the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::core::credentials::CredentialLease;
use crate::core::transcriber::{TranscribeError, TranscribeRequest, Transcript};
use crate::storage::{
    ActivityEntry, SegmentRecord, StoreError, TranscriptRecord, VideoId, VideoStatus,
};
use crate::utils::{format_bytes, format_duration_secs, sanitize_error_text};

use super::state::BatchState;
use super::types::Stage;
use super::Collaborators;

/// Wait between acquisition attempts when no slot is cooling but none
/// is free either.
const ACQUIRE_POLL: Duration = Duration::from_millis(250);

enum Acquired {
    Lease(CredentialLease),
    /// Every credential is errored; rotation cannot recover.
    Exhausted,
    Cancelled,
}

pub struct Worker {
    slot: usize,
    state: Arc<BatchState>,
    deps: Collaborators,
    settings: Arc<Settings>,
}

impl Worker {
    pub fn new(
        slot: usize,
        state: Arc<BatchState>,
        deps: Collaborators,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            slot,
            state,
            deps,
            settings,
        }
    }

    /// Consume the queue until it drains, cancellation is requested, or
    /// the credential rotation is permanently exhausted
    pub async fn run(self) {
        self.state.worker_started();
        debug!(worker = self.slot, "worker started");

        loop {
            if self.state.is_cancelled() {
                debug!(worker = self.slot, "cancellation requested, worker stopping");
                break;
            }

            let Some(video_id) = self.state.queue().pop() else {
                break;
            };

            match self.acquire_credential(video_id).await {
                Acquired::Lease(lease) => self.process(video_id, lease).await,
                Acquired::Exhausted => {
                    warn!(
                        worker = self.slot,
                        video = %video_id,
                        "no credential can become available, worker stopping"
                    );
                    self.state.queue().requeue_front(video_id);
                    break;
                }
                Acquired::Cancelled => {
                    self.state.queue().requeue_front(video_id);
                    break;
                }
            }
        }

        self.state.worker_finished();
        debug!(worker = self.slot, "worker exited");
    }

    /// Lease a credential, waiting out cooldowns as needed
    async fn acquire_credential(&self, video_id: VideoId) -> Acquired {
        loop {
            if self.state.is_cancelled() {
                return Acquired::Cancelled;
            }
            if let Some(lease) = self.state.pool().acquire(video_id).await {
                return Acquired::Lease(lease);
            }
            if !self.state.pool().has_available_or_cooling().await {
                return Acquired::Exhausted;
            }
            if !self.state.pool().wait_for_available().await {
                // A slot exists but another worker holds it right now.
                tokio::time::sleep(ACQUIRE_POLL).await;
            }
        }
    }

    /// The per-item pipeline, run while holding a credential lease
    async fn process(&self, video_id: VideoId, lease: CredentialLease) {
        let pool = self.state.pool();

        self.state.begin_item(video_id, lease.index).await;
        self.log_activity(video_id, "transcribe", "started", "").await;

        // Claim the row before touching anything else. Losing the race
        // means another actor owns the item: a benign skip, not an
        // error, and this worker must not write anything for it.
        let claimed = match self
            .deps
            .videos
            .try_claim(video_id, self.settings.stale_claim_window())
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(
                    worker = self.slot,
                    video = %video_id,
                    "video already claimed elsewhere, skipping"
                );
                pool.release(lease.index).await;
                self.state.skip_item(video_id).await;
                self.log_activity(
                    video_id,
                    "transcribe",
                    "skipped",
                    "already claimed by another worker",
                )
                .await;
                return;
            }
            Err(e) => {
                self.fail(video_id, lease.index, e.to_string()).await;
                return;
            }
        };

        let media = match self.deps.media.fetch(&claimed.file_path).await {
            Ok(bytes) => {
                self.state
                    .set_stage(
                        video_id,
                        Stage::Downloading,
                        format!("downloaded {}", format_bytes(bytes.len() as u64)),
                    )
                    .await;
                bytes
            }
            Err(e) => {
                self.fail(video_id, lease.index, e.to_string()).await;
                return;
            }
        };

        self.state
            .set_stage(video_id, Stage::Preparing, "preparing media")
            .await;
        let request = TranscribeRequest {
            media,
            mime_type: claimed.mime_type.clone(),
            model: pool.model().to_string(),
            language: self.settings.language.clone(),
        };

        self.state
            .set_stage(video_id, Stage::Transcribing, "waiting for transcription service")
            .await;
        let heartbeat = self.spawn_heartbeat(video_id);
        let started = Instant::now();
        let result = self.deps.transcriber.transcribe(&request, &lease.secret).await;
        heartbeat.abort();
        let elapsed = started.elapsed();

        match result {
            Ok(transcript) => {
                self.state
                    .set_stage(video_id, Stage::Saving, "saving transcript")
                    .await;
                match self.persist(video_id, transcript, elapsed).await {
                    Ok(()) => {
                        pool.release(lease.index).await;
                        self.state.complete_item(video_id).await;
                        self.log_activity(
                            video_id,
                            "transcribe",
                            "completed",
                            format!("took {}", format_duration_secs(elapsed.as_secs())),
                        )
                        .await;
                        info!(
                            worker = self.slot,
                            video = %video_id,
                            elapsed_secs = elapsed.as_secs_f64(),
                            "transcription completed"
                        );
                    }
                    Err(e) => self.fail(video_id, lease.index, e.to_string()).await,
                }
            }
            Err(e) if e.is_rate_limited() => {
                warn!(
                    worker = self.slot,
                    video = %video_id,
                    credential = lease.index,
                    "rate limited, cooling credential and re-queueing video"
                );
                pool.mark_rate_limited(lease.index, e.retry_after()).await;
                self.release_claim(video_id).await;
                self.state
                    .requeue_item(video_id, "re-queued after rate limit")
                    .await;
                self.log_activity(video_id, "transcribe", "rate_limited", "re-queued for retry")
                    .await;
            }
            Err(TranscribeError::Authentication(reason)) => {
                // A rejected credential is the credential's fault, not
                // the item's: disable the slot and let another one
                // retry the video.
                error!(
                    worker = self.slot,
                    credential = lease.index,
                    reason = %sanitize_error_text(&reason),
                    "credential rejected by service, disabling"
                );
                pool.mark_error(lease.index).await;
                self.release_claim(video_id).await;
                self.state
                    .requeue_item(video_id, "re-queued after credential rejection")
                    .await;
                self.log_activity(video_id, "transcribe", "credential_rejected", "re-queued for retry")
                    .await;
            }
            Err(e) => self.fail(video_id, lease.index, e.to_string()).await,
        }
    }

    /// Give up the persistence claim so a later attempt's conditional
    /// update can succeed
    async fn release_claim(&self, video_id: VideoId) {
        if let Err(e) = self
            .deps
            .videos
            .update_status(video_id, VideoStatus::Uploaded, None)
            .await
        {
            warn!(video = %video_id, error = %e, "could not release claim on re-queued video");
        }
    }

    /// Replace any existing transcription rows and mark the video
    /// transcribed
    async fn persist(
        &self,
        video_id: VideoId,
        transcript: Transcript,
        elapsed: Duration,
    ) -> Result<(), StoreError> {
        let removed = self.deps.transcripts.delete_for_video(video_id).await?;
        if removed > 0 {
            debug!(video = %video_id, removed, "replaced existing transcription rows");
        }

        let segments = transcript
            .segments
            .into_iter()
            .map(|s| SegmentRecord {
                start_secs: s.start_secs,
                end_secs: s.end_secs,
                text: s.text,
            })
            .collect();

        self.deps
            .transcripts
            .insert(TranscriptRecord {
                id: Uuid::new_v4(),
                video_id,
                full_text: transcript.full_text,
                language: transcript.language,
                segments,
                model: self.state.pool().model().to_string(),
                processing_time_secs: elapsed.as_secs_f64(),
                created_at: Utc::now(),
            })
            .await?;

        self.deps
            .videos
            .update_status(video_id, VideoStatus::Transcribed, None)
            .await?;
        Ok(())
    }

    /// Terminal failure: release the credential, sanitize, persist and
    /// record the error
    async fn fail(&self, video_id: VideoId, credential_index: usize, raw_error: String) {
        self.state.pool().release(credential_index).await;

        let message = sanitize_error_text(&raw_error);
        error!(
            worker = self.slot,
            video = %video_id,
            error = %message,
            "transcription failed"
        );

        if let Err(e) = self
            .deps
            .videos
            .update_status(video_id, VideoStatus::Error, Some(message.clone()))
            .await
        {
            warn!(video = %video_id, error = %e, "could not persist error status");
        }

        self.state.fail_item(video_id, message.clone()).await;
        self.log_activity(video_id, "transcribe", "failed", message).await;
    }

    /// Periodic elapsed-time detail updates while the service call is
    /// outstanding; aborted as soon as the call resolves
    fn spawn_heartbeat(&self, video_id: VideoId) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let interval = self.settings.heartbeat_interval();
        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let elapsed = started.elapsed().as_secs();
                state
                    .set_detail(
                        video_id,
                        format!("transcribing, {} elapsed", format_duration_secs(elapsed)),
                    )
                    .await;
            }
        })
    }

    async fn log_activity(
        &self,
        video_id: VideoId,
        operation: &str,
        status: &str,
        detail: impl Into<String>,
    ) {
        self.deps
            .activity
            .append(ActivityEntry::new(video_id, operation, status, detail.into()))
            .await;
    }
}
