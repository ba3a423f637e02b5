//! Composition root exposing the download subsystem to the embedding
//! application.
//!
//! `DownloadManager` is a thin facade: lifecycle and queue calls delegate to
//! the [`Downloader`], plus a handful of storage conveniences for callers
//! that only want to ask about committed chapters.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;

use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::{Error, Result};
use crate::layout::StorageLayout;
use crate::source::Catalog;
use crate::types::{Chapter, ChapterId, DownloadInfo, Event, Page, PageStatus, Series};

/// Facade over the download subsystem
#[derive(Clone)]
pub struct DownloadManager {
    downloader: Downloader,
    layout: StorageLayout,
}

impl DownloadManager {
    /// Create the download subsystem: opens the queue database, restores
    /// persisted downloads, and leaves the downloader idle.
    pub async fn new(config: Config, catalog: Arc<dyn Catalog>) -> Result<Self> {
        let layout = StorageLayout::new(&config.download_dir);
        let downloader = Downloader::new(config, catalog).await?;
        Ok(Self { downloader, layout })
    }

    /// Direct access to the downloader for advanced callers
    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// Enqueue chapters of a series. See
    /// [`Downloader::queue_chapters`].
    pub async fn queue_chapters(
        &self,
        series: &Series,
        chapters: &[Chapter],
    ) -> Result<Vec<ChapterId>> {
        self.downloader.queue_chapters(series, chapters).await
    }

    /// Start downloading; returns whether any work was scheduled
    pub async fn start(&self) -> bool {
        self.downloader.start().await
    }

    /// Stop the current run, optionally surfacing a user-visible reason
    /// (e.g. "no network")
    pub async fn stop(&self, reason: Option<&str>) {
        self.downloader.stop(reason).await
    }

    /// Empty the queue and the durable store
    pub async fn clear_queue(&self) -> Result<()> {
        self.downloader.clear_queue().await
    }

    /// Whether a download run is active
    pub fn is_running(&self) -> bool {
        self.downloader.is_running()
    }

    /// Watch channel mirroring the running state
    pub fn running_watch(&self) -> watch::Receiver<bool> {
        self.downloader.running_watch()
    }

    /// Running state as a stream, for lifecycle hosts that prefer one
    pub fn running_stream(&self) -> WatchStream<bool> {
        WatchStream::new(self.downloader.running_watch())
    }

    /// Subscribe to download events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.downloader.subscribe()
    }

    /// Read-only snapshot of the queue
    pub async fn queue_snapshot(&self) -> Vec<DownloadInfo> {
        self.downloader.queue_snapshot().await
    }

    /// Change the live concurrency bound
    pub fn set_concurrency(&self, limit: usize) {
        self.downloader.set_concurrency(limit);
    }

    /// Whether a chapter is fully downloaded on disk.
    ///
    /// Only a committed chapter directory counts — a chapter mid-download
    /// lives under a staging name and is invisible here.
    pub async fn is_chapter_downloaded(
        &self,
        source_name: &str,
        series: &Series,
        chapter: &Chapter,
    ) -> bool {
        self.layout
            .find_chapter_dir(source_name, series, chapter)
            .await
            .is_some()
    }

    /// Delete a downloaded chapter from disk (no-op if absent)
    pub async fn delete_chapter(
        &self,
        source_name: &str,
        series: &Series,
        chapter: &Chapter,
    ) -> Result<()> {
        if let Some(dir) = self.layout.find_chapter_dir(source_name, series, chapter).await {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Build a page list from a committed chapter directory, for reading
    /// downloaded chapters offline. Pages come back `Ready`, ordered by
    /// filename.
    pub async fn build_page_list(
        &self,
        source_name: &str,
        series: &Series,
        chapter: &Chapter,
    ) -> Result<Vec<Page>> {
        let dir = self
            .layout
            .find_chapter_dir(source_name, series, chapter)
            .await
            .ok_or_else(|| {
                let series_dir = self.layout.series_dir(source_name, series);
                Error::DirectoryNotFound(StorageLayout::chapter_dir(&series_dir, chapter))
            })?;

        let mut files: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "jpg" | "jpeg" | "png" | "gif" | "webp"));
            if is_image {
                files.push(path);
            }
        }
        files.sort();

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let mut page = Page::new(i as u32, None);
                page.uri = Some(path);
                page.status = PageStatus::Ready;
                page.progress = 100;
                page
            })
            .collect())
    }
}
