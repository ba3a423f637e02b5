//! In-memory download queue.
//!
//! An insertion-ordered collection of work items with constant-time
//! membership lookup by chapter id. The queue itself carries no locking and
//! no observers — it is owned exclusively by the orchestrator, which wraps
//! it in a mutex, funnels every mutation through its own methods, and emits
//! queue-change events on behalf of the queue.

use std::collections::HashSet;

use crate::types::{ChapterId, DownloadHandle, DownloadInfo};

/// Ordered set of download work items
#[derive(Default)]
pub(crate) struct DownloadQueue {
    items: Vec<DownloadHandle>,
    chapter_ids: HashSet<ChapterId>,
}

impl DownloadQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an item. Returns false (and leaves the queue unchanged) if a
    /// download for the same chapter is already queued.
    pub(crate) fn add(&mut self, download: DownloadHandle) -> bool {
        let chapter_id = lock_infallible(&download).chapter.id;
        if !self.chapter_ids.insert(chapter_id) {
            return false;
        }
        self.items.push(download);
        true
    }

    /// Remove the item for a chapter, returning it if present
    pub(crate) fn remove(&mut self, chapter_id: ChapterId) -> Option<DownloadHandle> {
        if !self.chapter_ids.remove(&chapter_id) {
            return None;
        }
        let pos = self
            .items
            .iter()
            .position(|d| lock_infallible(d).chapter.id == chapter_id)?;
        Some(self.items.remove(pos))
    }

    /// Whether a download for the chapter is queued
    pub(crate) fn contains(&self, chapter_id: ChapterId) -> bool {
        self.chapter_ids.contains(&chapter_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in insertion order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &DownloadHandle> {
        self.items.iter()
    }

    /// Drop every item
    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.chapter_ids.clear();
    }

    /// Read-only snapshot of every item, in queue order
    pub(crate) fn snapshot(&self) -> Vec<DownloadInfo> {
        self.items.iter().map(|d| lock_infallible(d).info()).collect()
    }
}

/// Lock a download handle, recovering the inner value if a worker panicked
/// while holding the lock.
pub(crate) fn lock_infallible(
    handle: &DownloadHandle,
) -> std::sync::MutexGuard<'_, crate::types::Download> {
    handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
