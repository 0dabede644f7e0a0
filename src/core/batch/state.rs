//! Shared state of one running batch
//!
//! Owned by an `Arc` held by the orchestrator, the workers and the
//! caller's handle; dropped once all of them let go. All mutation goes
//! through methods that update the progress table and then push a fresh
//! snapshot to the caller's callback, so every observable transition
//! produces exactly one notification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::core::credentials::CredentialPool;
use crate::storage::VideoId;

use super::progress;
use super::queue::WorkQueue;
use super::types::{BatchSnapshot, ProgressCallback, Stage, VideoProgress};

pub struct BatchState {
    queue: WorkQueue,
    pool: CredentialPool,
    /// Submission order; also the snapshot order. Fixed at creation.
    order: Vec<VideoId>,
    progress: RwLock<HashMap<VideoId, VideoProgress>>,
    completed: AtomicUsize,
    errors: AtomicUsize,
    active_workers: AtomicUsize,
    /// Completion instants of items that actually ran, for ETA.
    completions: Mutex<Vec<DateTime<Utc>>>,
    started_at: DateTime<Utc>,
    running: AtomicBool,
    cancelled: AtomicBool,
    on_progress: Option<ProgressCallback>,
}

impl BatchState {
    /// Build the state for one batch
    ///
    /// Duplicate ids are collapsed, keeping the first occurrence's
    /// position; every id starts in `queued` with a blank title.
    pub fn new(
        video_ids: Vec<VideoId>,
        pool: CredentialPool,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        let mut order = Vec::with_capacity(video_ids.len());
        let mut table = HashMap::with_capacity(video_ids.len());
        for id in video_ids {
            if !table.contains_key(&id) {
                order.push(id);
                table.insert(id, VideoProgress::queued(id));
            }
        }

        Self {
            queue: WorkQueue::new(order.iter().copied()),
            pool,
            order,
            progress: RwLock::new(table),
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            active_workers: AtomicUsize::new(0),
            completions: Mutex::new(Vec::new()),
            started_at: Utc::now(),
            running: AtomicBool::new(true),
            cancelled: AtomicBool::new(false),
            on_progress,
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn total(&self) -> usize {
        self.order.len()
    }

    /// Submitted video ids in submission order, duplicates removed
    pub fn video_ids(&self) -> &[VideoId] {
        &self.order
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Request cooperative cancellation; workers stop pulling new work
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Mark the batch finished once every worker has exited
    pub fn mark_finished(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_finished(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Set a display name during batch initialization; no notification
    pub fn set_title(&self, id: VideoId, title: impl Into<String>) {
        if let Some(item) = self.progress.write().get_mut(&id) {
            item.title = title.into();
        }
    }

    /// Item left the queue: record start time and the credential slot
    pub async fn begin_item(&self, id: VideoId, credential_index: usize) {
        {
            let mut table = self.progress.write();
            if let Some(item) = table.get_mut(&id) {
                item.stage = Stage::Downloading;
                item.detail = "downloading media".to_string();
                item.started_at = Some(Utc::now());
                item.credential_index = Some(credential_index);
                item.error = None;
            }
        }
        self.notify().await;
    }

    /// Move an item to a new stage
    pub async fn set_stage(&self, id: VideoId, stage: Stage, detail: impl Into<String>) {
        {
            let mut table = self.progress.write();
            if let Some(item) = table.get_mut(&id) {
                item.stage = stage;
                item.detail = detail.into();
            }
        }
        self.notify().await;
    }

    /// Update only the free-text detail (heartbeats)
    pub async fn set_detail(&self, id: VideoId, detail: impl Into<String>) {
        {
            let mut table = self.progress.write();
            if let Some(item) = table.get_mut(&id) {
                item.detail = detail.into();
            }
        }
        self.notify().await;
    }

    /// Return an item to the head of the queue for another attempt
    pub async fn requeue_item(&self, id: VideoId, detail: impl Into<String>) {
        {
            let mut table = self.progress.write();
            if let Some(item) = table.get_mut(&id) {
                item.stage = Stage::Queued;
                item.detail = detail.into();
                item.credential_index = None;
            }
        }
        self.queue.requeue_front(id);
        self.notify().await;
    }

    /// Terminal success for an item this worker processed
    pub async fn complete_item(&self, id: VideoId) {
        let now = Utc::now();
        {
            let mut table = self.progress.write();
            if let Some(item) = table.get_mut(&id) {
                item.stage = Stage::Completed;
                item.detail = String::new();
                item.completed_at = Some(now);
                item.credential_index = None;
            }
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.completions.lock().push(now);
        self.notify().await;
    }

    /// Terminal success for an item another actor already owned
    ///
    /// Counts toward `completed` but records no completion instant, so
    /// throughput reflects only work that actually ran here.
    pub async fn skip_item(&self, id: VideoId) {
        {
            let mut table = self.progress.write();
            if let Some(item) = table.get_mut(&id) {
                item.stage = Stage::Completed;
                item.detail = "already processed by another worker".to_string();
                item.completed_at = Some(Utc::now());
                item.credential_index = None;
            }
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.notify().await;
    }

    /// Terminal failure with sanitized error text
    pub async fn fail_item(&self, id: VideoId, message: String) {
        {
            let mut table = self.progress.write();
            if let Some(item) = table.get_mut(&id) {
                item.stage = Stage::Error;
                item.detail = message.clone();
                item.error = Some(message);
                item.completed_at = Some(Utc::now());
                item.credential_index = None;
            }
        }
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.notify().await;
    }

    /// Build an immutable snapshot of the whole batch
    pub async fn snapshot(&self) -> BatchSnapshot {
        let key_statuses = self.pool.statuses().await;

        let items: Vec<VideoProgress> = {
            let table = self.progress.read();
            self.order
                .iter()
                .filter_map(|id| table.get(id).cloned())
                .collect()
        };

        let completed = self.completed.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let active_workers = self.active_workers.load(Ordering::Relaxed);

        let avg_secs_per_video = {
            let completions = self.completions.lock();
            progress::avg_secs_per_video(&completions, self.started_at)
        };
        let eta_secs = progress::eta_secs(
            self.total(),
            completed,
            errors,
            active_workers,
            avg_secs_per_video,
        );

        BatchSnapshot {
            total: self.total(),
            completed,
            errors,
            active_workers,
            is_running: self.is_running(),
            is_cancelled: self.is_cancelled(),
            items,
            key_statuses,
            avg_secs_per_video,
            eta_secs,
        }
    }

    /// Push a fresh snapshot to the caller's callback, if one is set
    pub async fn notify(&self) {
        let Some(callback) = &self.on_progress else {
            return;
        };
        let snapshot = self.snapshot().await;
        callback(snapshot);
    }
}
