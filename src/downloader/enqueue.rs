//! Chapter enqueueing and startup queue restoration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::Result;
use crate::layout::StorageLayout;
use crate::queue::{DownloadQueue, lock_infallible};
use crate::source::Source;
use crate::types::{
    Chapter, ChapterId, Download, DownloadHandle, DownloadStatus, Event, Series, SeriesId,
};

use super::Downloader;

impl Downloader {
    /// Add chapters of a series to the download queue.
    ///
    /// Chapters are enqueued in descending source order, so that combined
    /// with queue FIFO semantics they download in natural reading order.
    /// Within one call, chapters sharing a name are collapsed to the first
    /// occurrence (some sources list the same logical chapter twice).
    /// Chapters already queued or already present on disk are skipped.
    ///
    /// Returns the ids of the chapters actually enqueued. If the downloader
    /// is running, new items are submitted to the execution engine
    /// immediately; otherwise they wait for the next [`start`](Self::start).
    pub async fn queue_chapters(
        &self,
        series: &Series,
        chapters: &[Chapter],
    ) -> Result<Vec<ChapterId>> {
        let Some(source) = self.catalog.source(series.source) else {
            tracing::warn!(
                series_id = series.id.0,
                source = series.source,
                "No source for series; nothing queued"
            );
            return Ok(Vec::new());
        };
        let series = Arc::new(series.clone());

        // Enqueue from the start of the series
        let mut sorted: Vec<Chapter> = chapters.to_vec();
        sorted.sort_by(|a, b| b.source_order.cmp(&a.source_order));

        // Collapse duplicate chapter names within this call
        let mut added_names: HashSet<String> = HashSet::new();

        let mut pending: Vec<DownloadHandle> = Vec::new();
        let mut ids: Vec<ChapterId> = Vec::new();
        {
            let mut queue = self.queue.lock().await;
            for chapter in sorted {
                if !added_names.insert(chapter.name.clone()) {
                    continue;
                }

                let Some(mut download) = self
                    .prepare_download(&queue, &series, chapter, &source)
                    .await
                else {
                    continue;
                };

                download.status = DownloadStatus::Queued;
                self.store.add(&download).await?;
                ids.push(download.chapter.id);

                let handle = download.into_handle();
                queue.add(handle.clone());
                pending.push(handle);
            }

            if !pending.is_empty() {
                self.emit_event(Event::QueueUpdated { size: queue.len() });
            }
        }

        for handle in &pending {
            let info = lock_infallible(handle).info();
            self.emit_event(Event::Queued { download: info });
        }

        if self.is_running() {
            self.submit(pending).await;
        }

        Ok(ids)
    }

    /// Prepare a download for a chapter. Returns None if the chapter is
    /// already queued or already downloaded; otherwise returns the new work
    /// item with its target directory assigned.
    pub(crate) async fn prepare_download(
        &self,
        queue: &DownloadQueue,
        series: &Arc<Series>,
        chapter: Chapter,
        source: &Arc<dyn Source>,
    ) -> Option<Download> {
        // If the chapter is already queued, don't add it again
        if queue.contains(chapter.id) {
            return None;
        }

        let series_dir = self.layout.series_dir(source.name(), series);
        let chapter_dir = StorageLayout::chapter_dir(&series_dir, &chapter);

        // A committed chapter directory means the chapter is fully downloaded
        if StorageLayout::exists(&chapter_dir).await {
            tracing::debug!(
                chapter_id = chapter.id.0,
                dir = %chapter_dir.display(),
                "Chapter already on disk; skipping"
            );
            return None;
        }

        Some(Download::new(series.clone(), chapter, source.clone(), chapter_dir))
    }

    /// Restore the persisted queue after a restart.
    ///
    /// Drains the durable store (which clears it), re-resolves every record
    /// through the catalog, and re-enqueues whatever still resolves. Records
    /// whose series, chapter, or source no longer exist are dropped
    /// silently; records whose chapter landed on disk in the meantime are
    /// skipped by the usual prepare checks. Restored items are re-persisted
    /// immediately.
    pub(crate) async fn restore_queue(&self) -> Result<()> {
        let records = self.store.restore().await?;
        if records.is_empty() {
            return Ok(());
        }

        tracing::info!(count = records.len(), "Restoring download queue");

        let mut cached_series: HashMap<SeriesId, Option<Arc<Series>>> = HashMap::new();
        let mut restored = 0usize;

        let mut queue = self.queue.lock().await;
        for record in records {
            let series = match cached_series.get(&record.series_id) {
                Some(cached) => cached.clone(),
                None => {
                    let resolved = self.catalog.series(record.series_id).await.map(Arc::new);
                    cached_series.insert(record.series_id, resolved.clone());
                    resolved
                }
            };
            let Some(series) = series else { continue };
            let Some(source) = self.catalog.source(series.source) else {
                continue;
            };
            let Some(chapter) = self.catalog.chapter(record.chapter_id).await else {
                continue;
            };

            let Some(mut download) = self
                .prepare_download(&queue, &series, chapter, &source)
                .await
            else {
                continue;
            };

            download.status = DownloadStatus::Queued;
            self.store.add(&download).await?;
            queue.add(download.into_handle());
            restored += 1;
        }

        let size = queue.len();
        drop(queue);

        if restored > 0 {
            self.emit_event(Event::QueueUpdated { size });
        }
        tracing::info!(restored, "Download queue restoration complete");

        Ok(())
    }
}
