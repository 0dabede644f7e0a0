//! Batch lifecycle: start, cancel, query
//!
//! At most one batch runs at a time. The single-flight rule is an
//! explicit guard: a slot holding the current batch's state, checked
//! and set in one critical section at `start` and cleared by the
//! supervisor once every worker has exited.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Settings;
use crate::core::credentials::CredentialPool;
use crate::storage::{ActivityEntry, VideoId, VideoStatus};
use crate::utils::error::{Error, Result};
use crate::utils::{mask_secret, sanitize_error_text};

use super::state::BatchState;
use super::types::{BatchSnapshot, ProgressCallback};
use super::worker::Worker;
use super::Collaborators;

/// Outcome of checking one configured credential against the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVerification {
    pub index: usize,
    pub masked_secret: String,
    pub valid: bool,
    /// Sanitized rejection reason, capped for display.
    pub error: Option<String>,
}

/// Entry point for batch transcription
pub struct BatchOrchestrator {
    settings: Arc<Settings>,
    deps: Collaborators,
    current: Arc<Mutex<Option<Arc<BatchState>>>>,
}

impl BatchOrchestrator {
    pub fn new(settings: Settings, deps: Collaborators) -> Self {
        Self {
            settings: Arc::new(settings),
            deps,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start a batch over `video_ids`
    ///
    /// Rejects with [`Error::AlreadyRunning`] while another batch is
    /// active and with [`Error::Configuration`] when no credentials are
    /// configured. Spawns one worker per credential; the returned
    /// handle cancels, queries and awaits the batch.
    pub async fn start(
        &self,
        video_ids: Vec<VideoId>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<BatchHandle> {
        let state = {
            let mut current = self.current.lock();
            if current.as_ref().map(|s| s.is_running()).unwrap_or(false) {
                return Err(Error::AlreadyRunning);
            }

            let pool = CredentialPool::from_settings(&self.settings)?;
            let state = Arc::new(BatchState::new(video_ids, pool, on_progress));
            *current = Some(Arc::clone(&state));
            state
        };

        info!(
            total = state.total(),
            workers = state.pool().credential_count(),
            "starting transcription batch"
        );

        // Best-effort display names; a failed lookup leaves the title
        // blank and is not fatal.
        for id in state.video_ids().to_vec() {
            if let Ok(Some(record)) = self.deps.videos.get(id).await {
                state.set_title(id, record.title);
            }
        }

        state.notify().await;

        let worker_count = state.pool().credential_count();
        let mut handles = Vec::with_capacity(worker_count);
        for slot in 0..worker_count {
            let worker = Worker::new(
                slot,
                Arc::clone(&state),
                self.deps.clone(),
                Arc::clone(&self.settings),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        let done = tokio::spawn(Self::supervise(
            handles,
            Arc::clone(&state),
            Arc::clone(&self.current),
        ));

        Ok(BatchHandle { state, done })
    }

    /// Wait for the workers, emit the final snapshot, clear the
    /// single-flight slot
    async fn supervise(
        handles: Vec<JoinHandle<()>>,
        state: Arc<BatchState>,
        current: Arc<Mutex<Option<Arc<BatchState>>>>,
    ) {
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "worker task aborted");
            }
        }

        state.mark_finished();
        state.notify().await;

        {
            let mut slot = current.lock();
            let is_ours = slot
                .as_ref()
                .map(|active| Arc::ptr_eq(active, &state))
                .unwrap_or(false);
            if is_ours {
                *slot = None;
            }
        }

        info!(
            completed = state.completed_count(),
            errors = state.error_count(),
            unprocessed = state.queue().len(),
            "batch finished"
        );
    }

    /// Snapshot of the active batch, or `None` when idle
    pub async fn current_progress(&self) -> Option<BatchSnapshot> {
        let state = self.current.lock().as_ref().map(Arc::clone);
        match state {
            Some(state) => Some(state.snapshot().await),
            None => None,
        }
    }

    pub fn is_batch_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map(|s| s.is_running())
            .unwrap_or(false)
    }

    /// Check every configured credential against the service
    pub async fn verify_credentials(&self) -> Vec<KeyVerification> {
        let mut results = Vec::with_capacity(self.settings.credentials.len());
        for (index, secret) in self.settings.credentials.iter().enumerate() {
            let verification = match self.deps.transcriber.verify_key(secret).await {
                Ok(()) => KeyVerification {
                    index,
                    masked_secret: mask_secret(secret),
                    valid: true,
                    error: None,
                },
                Err(e) => KeyVerification {
                    index,
                    masked_secret: mask_secret(secret),
                    valid: false,
                    error: Some(short_error(&e.to_string())),
                },
            };
            results.push(verification);
        }
        results
    }

    /// Put a failed or never-processed video back into the uploaded
    /// state, dropping any transcription rows
    ///
    /// Videos in other states are refused: an in-flight item belongs to
    /// its worker, and archived ones are out of scope.
    pub async fn reset_video(&self, video_id: VideoId) -> Result<()> {
        let record = self
            .deps
            .videos
            .get(video_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("video {}", video_id)))?;

        match record.status {
            VideoStatus::Error | VideoStatus::Uploaded => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "cannot reset video in status {}",
                    other.as_str()
                )));
            }
        }

        let removed = self.deps.transcripts.delete_for_video(video_id).await?;
        self.deps
            .videos
            .update_status(video_id, VideoStatus::Uploaded, None)
            .await?;
        self.deps
            .activity
            .append(ActivityEntry::new(
                video_id,
                "reset",
                "completed",
                format!("removed {} transcription rows", removed),
            ))
            .await;

        info!(video = %video_id, removed, "video reset for re-transcription");
        Ok(())
    }
}

/// Caller's handle to a running batch
pub struct BatchHandle {
    state: Arc<BatchState>,
    done: JoinHandle<()>,
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("is_running", &self.state.is_running())
            .finish_non_exhaustive()
    }
}

impl BatchHandle {
    /// Request cooperative cancellation and emit an updated snapshot
    ///
    /// Workers stop pulling new work; pipelines already past the claim
    /// run to their terminal stage.
    pub async fn cancel(&self) {
        info!("batch cancellation requested");
        self.state.request_cancel();
        self.state.notify().await;
    }

    pub async fn snapshot(&self) -> BatchSnapshot {
        self.state.snapshot().await
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Wait until every worker has exited, then return the final
    /// snapshot
    pub async fn wait(self) -> BatchSnapshot {
        if let Err(e) = self.done.await {
            error!(error = %e, "batch supervisor aborted");
        }
        self.state.snapshot().await
    }
}

/// Sanitized error text capped for display in settings screens
fn short_error(raw: &str) -> String {
    sanitize_error_text(raw).chars().take(100).collect()
}
