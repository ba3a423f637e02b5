//! Core downloader implementation split into focused submodules.
//!
//! The `Downloader` struct and its methods are organized by domain:
//! - [`enqueue`] - Chapter enqueueing and startup queue restoration
//! - [`control`] - Lifecycle control (start/stop/clear) and engine management
//! - [`scheduler`] - Dynamic bounded-concurrency execution engine
//! - [`download_task`] - Per-chapter download pipeline

mod control;
mod download_task;
mod enqueue;
mod scheduler;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::layout::StorageLayout;
use crate::queue::{DownloadQueue, lock_infallible};
use crate::source::Catalog;
use crate::store::DownloadStore;
use crate::types::{ChapterId, DownloadInfo, Event};

use scheduler::Engine;

/// Main downloader instance (cloneable - all fields are Arc-wrapped).
///
/// Owns the in-memory queue, the durable store, and the execution engine.
/// All queue and store mutation funnels through methods on this type; the
/// outside world observes state through [`subscribe`](Self::subscribe),
/// [`running_watch`](Self::running_watch), and
/// [`queue_snapshot`](Self::queue_snapshot).
#[derive(Clone)]
pub struct Downloader {
    /// Durable record of outstanding work
    pub(crate) store: Arc<DownloadStore>,
    /// Resolves ids and source keys back to objects
    pub(crate) catalog: Arc<dyn Catalog>,
    /// On-disk layout of the download tree
    pub(crate) layout: StorageLayout,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// In-memory queue; mutated only through Downloader methods
    pub(crate) queue: Arc<tokio::sync::Mutex<DownloadQueue>>,
    /// Execution engine for the current run (None while idle)
    pub(crate) engine: Arc<tokio::sync::Mutex<Option<Engine>>>,
    /// Running state, mirrored to lifecycle hosts via a watch channel
    pub(crate) running_tx: Arc<watch::Sender<bool>>,
    /// Live concurrency bound; the engine re-reads it on every event
    pub(crate) limit_tx: Arc<watch::Sender<usize>>,
}

impl Downloader {
    /// Create a new downloader.
    ///
    /// Opens (or creates) the queue database, creates the download root
    /// directory, and restores any downloads persisted by a previous
    /// session. Restored items wait in the queue until [`start`](Self::start)
    /// is called.
    pub async fn new(config: Config, catalog: Arc<dyn Catalog>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.database_path).await?;
        let store = Arc::new(DownloadStore::new(Arc::new(db)));
        let layout = StorageLayout::new(&config.download_dir);

        // Buffered so slow subscribers don't stall the pipeline
        let (event_tx, _rx) = broadcast::channel(1024);
        let (running_tx, _running_rx) = watch::channel(false);
        let (limit_tx, _limit_rx) = watch::channel(config.max_concurrent_downloads.max(1));

        let downloader = Self {
            store,
            catalog,
            layout,
            config: Arc::new(config),
            event_tx,
            queue: Arc::new(tokio::sync::Mutex::new(DownloadQueue::new())),
            engine: Arc::new(tokio::sync::Mutex::new(None)),
            running_tx: Arc::new(running_tx),
            limit_tx: Arc::new(limit_tx),
        };

        downloader.restore_queue().await?;

        Ok(downloader)
    }

    /// Subscribe to download events.
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind by more than the
    /// channel buffer receives a `RecvError::Lagged` error.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether a download run is currently active
    pub fn is_running(&self) -> bool {
        *self.running_tx.borrow()
    }

    /// Watch channel mirroring the running state.
    ///
    /// Lifecycle hosts use this to acquire/release wake-lock-equivalent
    /// resources: `true` is sent when a run starts, `false` when it stops or
    /// every queued item reaches a terminal state.
    pub fn running_watch(&self) -> watch::Receiver<bool> {
        self.running_tx.subscribe()
    }

    /// Current live concurrency bound
    pub fn concurrency(&self) -> usize {
        *self.limit_tx.borrow()
    }

    /// Change the concurrency bound while running.
    ///
    /// Raising the bound lets additional queued items start immediately;
    /// lowering it never aborts in-flight items — it only throttles how many
    /// new items start. Values below 1 are clamped to 1.
    pub fn set_concurrency(&self, limit: usize) {
        let limit = limit.max(1);
        tracing::info!(limit, "Concurrency bound changed");
        self.limit_tx.send_replace(limit);
    }

    /// Read-only snapshot of the queue, in queue order
    pub async fn queue_snapshot(&self) -> Vec<DownloadInfo> {
        self.queue.lock().await.snapshot()
    }

    /// Whether a download for the chapter is currently queued
    pub async fn is_chapter_queued(&self, chapter_id: ChapterId) -> bool {
        self.queue.lock().await.contains(chapter_id)
    }

    /// Whether every item in the queue has reached a terminal state
    pub(crate) async fn all_downloads_finished(&self) -> bool {
        let queue = self.queue.lock().await;
        queue.iter().all(|d| lock_infallible(d).status.is_finished())
    }

    /// Emit an event to all subscribers.
    ///
    /// If there are no active subscribers the event is dropped; downloads
    /// proceed whether or not anyone is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
