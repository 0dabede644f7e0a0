//! In-process storage adapter
//!
//! Backs every persistence trait with maps behind async locks. Used by
//! the test suite and by callers that want the orchestrator without an
//! external database. The claim semantics match what a SQL backend
//! implements with a single conditional `UPDATE`: the check and the
//! flip happen under one write lock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;

use super::types::{
    ActivityEntry, StoreError, TranscriptRecord, VideoId, VideoRecord, VideoStatus,
};
use super::{ActivityLog, MediaStore, TranscriptStore, VideoStore};

/// Storage adapter holding all state in memory
#[derive(Default)]
pub struct MemoryStore {
    videos: RwLock<HashMap<VideoId, VideoRecord>>,
    transcripts: RwLock<HashMap<VideoId, Vec<TranscriptRecord>>>,
    media: RwLock<HashMap<String, Bytes>>,
    activity: RwLock<Vec<ActivityEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a video row
    pub async fn insert_video(&self, record: VideoRecord) {
        self.videos.write().await.insert(record.id, record);
    }

    /// Seed media bytes at a path
    pub async fn put_media(&self, path: impl Into<String>, bytes: Bytes) {
        self.media.write().await.insert(path.into(), bytes);
    }

    /// Current copy of a video row, if present
    pub async fn video(&self, id: VideoId) -> Option<VideoRecord> {
        self.videos.read().await.get(&id).cloned()
    }

    /// All activity entries appended so far
    pub async fn activity_entries(&self) -> Vec<ActivityEntry> {
        self.activity.read().await.clone()
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, StoreError> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn try_claim(
        &self,
        id: VideoId,
        stale_after: Duration,
    ) -> Result<Option<VideoRecord>, StoreError> {
        // Single critical section: the status check and the flip must
        // not be observable separately.
        let mut videos = self.videos.write().await;

        let Some(record) = videos.get_mut(&id) else {
            return Ok(None);
        };

        let age = Utc::now().signed_duration_since(record.updated_at);
        let is_stale = age.to_std().map(|d| d >= stale_after).unwrap_or(false);

        if record.status == VideoStatus::Transcribing && !is_stale {
            return Ok(None);
        }

        record.status = VideoStatus::Transcribing;
        record.error_message = None;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn update_status(
        &self,
        id: VideoId,
        status: VideoStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut videos = self.videos.write().await;
        let record = videos.get_mut(&id).ok_or(StoreError::VideoNotFound(id))?;
        record.status = status;
        record.error_message = error_message;
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn delete_for_video(&self, video_id: VideoId) -> Result<u64, StoreError> {
        let removed = self
            .transcripts
            .write()
            .await
            .remove(&video_id)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }

    async fn insert(&self, record: TranscriptRecord) -> Result<(), StoreError> {
        self.transcripts
            .write()
            .await
            .entry(record.video_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn find_by_video(&self, video_id: VideoId) -> Result<Vec<TranscriptRecord>, StoreError> {
        Ok(self
            .transcripts
            .read()
            .await
            .get(&video_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn fetch(&self, path: &str) -> Result<Bytes, StoreError> {
        self.media
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::MediaNotFound(path.to_string()))
    }
}

#[async_trait]
impl ActivityLog for MemoryStore {
    async fn append(&self, entry: ActivityEntry) {
        self.activity.write().await.push(entry);
    }
}
