//! Execution engine — dynamic bounded concurrency.
//!
//! At most N chapters download concurrently, where N is a live value pushed
//! through a watch channel. The engine is an explicit scheduler loop holding
//! a pending work deque, the set of in-flight task handles, and the current
//! limit; on every relevant event (work arrives, the limit changes, a task
//! completes) it launches `min(limit - in_flight, pending)` new tasks and
//! never touches tasks already in flight. Raising the limit therefore starts
//! queued items immediately, and lowering it only throttles new starts.

use std::collections::VecDeque;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::DownloadHandle;

use super::Downloader;

/// Handle to a running execution engine
pub(crate) struct Engine {
    /// Feed of queued items (batched, in queue order)
    pub(crate) work_tx: mpsc::UnboundedSender<Vec<DownloadHandle>>,
    /// Cancels the scheduler loop and aborts in-flight tasks
    pub(crate) cancel: CancellationToken,
    /// The scheduler loop task; joined on external stop so that callers
    /// observe a fully-quiesced engine
    pub(crate) task: tokio::task::JoinHandle<()>,
}

/// Spawn the scheduler loop for a new run
pub(crate) fn spawn_engine(downloader: Downloader) -> Engine {
    let (work_tx, work_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_engine(downloader, work_rx, cancel.clone()));

    Engine {
        work_tx,
        cancel,
        task,
    }
}

async fn run_engine(
    downloader: Downloader,
    mut work_rx: mpsc::UnboundedReceiver<Vec<DownloadHandle>>,
    cancel: CancellationToken,
) {
    let mut limit_rx = downloader.limit_tx.subscribe();
    let mut pending: VecDeque<DownloadHandle> = VecDeque::new();
    let mut in_flight: FuturesUnordered<JoinHandle<DownloadHandle>> = FuturesUnordered::new();

    loop {
        // Top up to the current limit before waiting for the next event
        let limit = *limit_rx.borrow_and_update();
        while in_flight.len() < limit {
            let Some(handle) = pending.pop_front() else {
                break;
            };
            let task_downloader = downloader.clone();
            in_flight.push(tokio::spawn(async move {
                task_downloader.download_chapter(handle.clone()).await;
                handle
            }));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                // Stop requested: abort in-flight work at its next await
                // point. stop() marks interrupted items as errored.
                for task in in_flight.iter() {
                    task.abort();
                }
                break;
            }

            Some(batch) = work_rx.recv() => {
                pending.extend(batch);
            }

            changed = limit_rx.changed() => {
                if changed.is_err() {
                    // Limit sender dropped; downloader is gone
                    break;
                }
            }

            Some(result) = in_flight.next(), if !in_flight.is_empty() => {
                match result {
                    Ok(handle) => {
                        let all_finished = downloader.on_chapter_done(handle).await;
                        if all_finished && pending.is_empty() && in_flight.is_empty() {
                            downloader.finish_run().await;
                            break;
                        }
                    }
                    Err(join_error) => {
                        for task in in_flight.iter() {
                            task.abort();
                        }
                        downloader
                            .fail_run(&format!("download task failed: {join_error}"))
                            .await;
                        break;
                    }
                }
            }
        }
    }
}
