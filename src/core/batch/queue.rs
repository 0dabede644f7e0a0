//! Shared FIFO work queue
//!
//! FIFO except for one deliberate reordering: rate limited items are
//! reinserted at the head so they retry ahead of untouched work.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::storage::VideoId;

pub struct WorkQueue {
    inner: Mutex<VecDeque<VideoId>>,
}

impl WorkQueue {
    pub fn new(ids: impl IntoIterator<Item = VideoId>) -> Self {
        Self {
            inner: Mutex::new(ids.into_iter().collect()),
        }
    }

    /// Take the next item, oldest first
    pub fn pop(&self) -> Option<VideoId> {
        self.inner.lock().pop_front()
    }

    /// Reinsert an item at the head, ahead of untouched work
    pub fn requeue_front(&self, id: VideoId) {
        self.inner.lock().push_front(id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
