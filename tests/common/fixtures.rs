//! Builders for the stores, settings and collaborator wiring the
//! scenario tests run against

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use batchscribe::{Collaborators, MemoryStore, Settings, Transcriber, VideoId, VideoRecord};

/// Settings with `credentials` throwaway keys and defaults otherwise
pub fn test_settings(credentials: usize) -> Settings {
    Settings {
        credentials: (0..credentials).map(|i| format!("test-key-{i}")).collect(),
        ..Settings::default()
    }
}

/// A store seeded with `count` uploaded videos and their media blobs
pub async fn seeded_store(count: usize) -> (Arc<MemoryStore>, Vec<VideoId>) {
    let store = Arc::new(MemoryStore::new());
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        ids.push(seed_video(&store, &format!("video-{i}")).await);
    }
    (store, ids)
}

/// Insert one uploaded video plus its media bytes, returning the id
pub async fn seed_video(store: &MemoryStore, title: &str) -> VideoId {
    let id = Uuid::new_v4();
    let path = format!("media/{title}.mp4");
    store
        .insert_video(VideoRecord::new(id, title, &path, "video/mp4"))
        .await;
    store
        .put_media(path, Bytes::from_static(b"not really an mp4"))
        .await;
    id
}

/// Wire a single [`MemoryStore`] into every persistence role
pub fn collaborators(store: &Arc<MemoryStore>, transcriber: Arc<dyn Transcriber>) -> Collaborators {
    Collaborators {
        videos: store.clone(),
        transcripts: store.clone(),
        media: store.clone(),
        activity: store.clone(),
        transcriber,
    }
}
