//! Lifecycle control — start, stop, clear, and engine management.

use crate::error::Result;
use crate::queue::lock_infallible;
use crate::types::{DownloadHandle, DownloadStatus, Event};

use super::Downloader;
use super::scheduler;

impl Downloader {
    /// Start downloading the queue.
    ///
    /// A no-op returning `false` if the downloader is already running or
    /// the queue is empty. Otherwise every non-completed item (including
    /// items in the `Error` state — this is the retry path) is reset to
    /// `Queued`, submitted to the execution engine, and `true` is returned
    /// if any work was actually scheduled.
    pub async fn start(&self) -> bool {
        if self.is_running() {
            return false;
        }

        let mut pending: Vec<DownloadHandle> = Vec::new();
        {
            let queue = self.queue.lock().await;
            if queue.is_empty() {
                return false;
            }
            for handle in queue.iter() {
                let mut download = lock_infallible(handle);
                if download.status != DownloadStatus::Downloaded {
                    if download.status != DownloadStatus::Queued {
                        download.status = DownloadStatus::Queued;
                    }
                    pending.push(handle.clone());
                }
            }
        }

        // Only Downloaded items remain: nothing to schedule, stay idle
        if pending.is_empty() {
            return false;
        }

        self.ensure_engine().await;

        for handle in &pending {
            let info = lock_infallible(handle).info();
            self.emit_event(Event::Queued { download: info });
        }

        self.submit(pending).await;
        true
    }

    /// Stop the current run.
    ///
    /// Cancels the execution engine and marks any item caught mid-flight
    /// (`Downloading`) as `Error` — interrupted, not failed. Items still in
    /// the `Queued` state are left untouched in the queue. If a reason is
    /// supplied it is surfaced to observers as a warning; `stop` itself
    /// never fails.
    pub async fn stop(&self, reason: Option<&str>) {
        self.destroy_engine().await;

        let mut interrupted = Vec::new();
        {
            let queue = self.queue.lock().await;
            for handle in queue.iter() {
                let mut download = lock_infallible(handle);
                if download.status == DownloadStatus::Downloading {
                    download.status = DownloadStatus::Error;
                    interrupted.push(download.info());
                }
            }
        }
        for info in interrupted {
            self.emit_event(Event::Progress { download: info });
        }

        if let Some(message) = reason {
            tracing::info!(reason = message, "Downloads stopped");
            self.emit_event(Event::Error {
                message: message.to_string(),
                context: None,
            });
        }
    }

    /// Empty the queue and the durable store.
    ///
    /// Callable from any state; stops the current run first.
    pub async fn clear_queue(&self) -> Result<()> {
        self.destroy_engine().await;

        {
            let mut queue = self.queue.lock().await;
            queue.clear();
        }
        self.store.clear().await?;

        self.emit_event(Event::QueueUpdated { size: 0 });
        Ok(())
    }

    /// Spawn the execution engine if it isn't running
    pub(crate) async fn ensure_engine(&self) {
        let mut engine = self.engine.lock().await;
        if engine.is_none() {
            *engine = Some(scheduler::spawn_engine(self.clone()));
            self.running_tx.send_replace(true);
            tracing::info!("Download engine started");
        }
    }

    /// Cancel the execution engine and wait for it to quiesce.
    ///
    /// Must not be called from inside the engine loop (it joins the loop
    /// task); the loop's own exit paths go through
    /// [`finish_run`](Self::finish_run) / [`fail_run`](Self::fail_run)
    /// instead.
    pub(crate) async fn destroy_engine(&self) {
        let engine = self.engine.lock().await.take();
        if let Some(engine) = engine {
            engine.cancel.cancel();
            // After this join, in-flight tasks are aborted and no further
            // status transitions can race the caller
            let _ = engine.task.await;
            self.running_tx.send_replace(false);
            tracing::info!("Download engine stopped");
        }
    }

    /// Hand a batch of queued items to the execution engine
    pub(crate) async fn submit(&self, pending: Vec<DownloadHandle>) {
        if pending.is_empty() {
            return;
        }
        let engine = self.engine.lock().await;
        if let Some(engine) = engine.as_ref() {
            engine.work_tx.send(pending).ok();
        }
    }

    /// Completion handler, invoked by the engine loop for every finished
    /// pipeline run. Successful items leave the queue and the store;
    /// unsuccessful ones stay for retry/removal, with their terminal state
    /// emitted as a final progress observation. Returns whether every item
    /// in the queue is now terminal.
    pub(crate) async fn on_chapter_done(&self, handle: DownloadHandle) -> bool {
        let (status, chapter_id, info) = {
            let download = lock_infallible(&handle);
            (download.status, download.chapter.id, download.info())
        };

        if status == DownloadStatus::Downloaded {
            let size = {
                let mut queue = self.queue.lock().await;
                queue.remove(chapter_id);
                queue.len()
            };
            if let Err(e) = self.store.remove(chapter_id).await {
                tracing::error!(chapter_id = chapter_id.0, error = %e, "Failed to remove persisted record");
            }
            self.emit_event(Event::QueueUpdated { size });
            self.emit_event(Event::Completed { download: info });
        } else {
            self.emit_event(Event::Progress { download: info });
        }

        self.all_downloads_finished().await
    }

    /// Engine loop exited because every item reached a terminal state:
    /// release the engine and signal the lifecycle host it may let go of
    /// wake/foreground resources.
    pub(crate) async fn finish_run(&self) {
        self.engine.lock().await.take();
        self.running_tx.send_replace(false);
        tracing::info!("All downloads finished; downloader idle");
    }

    /// A pipeline task died without reporting back (engine-level error):
    /// surface it, stop the run, and keep the queue for a later resume.
    ///
    /// Runs inside the engine loop (which exits right after), so the engine
    /// is torn down inline rather than through
    /// [`destroy_engine`](Self::destroy_engine).
    pub(crate) async fn fail_run(&self, message: &str) {
        tracing::error!(message, "Download engine error; stopping run");
        self.emit_event(Event::Error {
            message: message.to_string(),
            context: None,
        });

        if let Some(engine) = self.engine.lock().await.take() {
            engine.cancel.cancel();
        }
        self.running_tx.send_replace(false);

        let mut interrupted = Vec::new();
        {
            let queue = self.queue.lock().await;
            for handle in queue.iter() {
                let mut download = lock_infallible(handle);
                if download.status == DownloadStatus::Downloading {
                    download.status = DownloadStatus::Error;
                    interrupted.push(download.info());
                }
            }
        }
        for info in interrupted {
            self.emit_event(Event::Progress { download: info });
        }
    }
}
