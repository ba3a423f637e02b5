//! Durable record of outstanding downloads.
//!
//! The store exists so the queue survives process restarts. It keeps one
//! record per queued chapter — just the ids and an insertion order, not the
//! objects — and is drained exactly once at startup: `restore()` reads every
//! record back and then clears the table, after which the in-memory queue is
//! authoritative and the store is only touched by per-item `add`/`remove`
//! calls as items enter and leave the queue.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::db::Database;
use crate::error::Result;
use crate::types::{ChapterId, Download, SeriesId};

/// Persisted form of a queued download
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Owning series id
    pub series_id: SeriesId,
    /// Chapter id (also the record key)
    pub chapter_id: ChapterId,
    /// Monotonic insertion order within this process lifetime
    pub order: i64,
}

/// Durable queue persistence over the key-value [`Database`]
#[derive(Debug)]
pub struct DownloadStore {
    db: Arc<Database>,
    /// Counter used to keep the queue order
    counter: AtomicI64,
}

impl DownloadStore {
    /// Create a store over an open database
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            counter: AtomicI64::new(0),
        }
    }

    /// Persist a download. One record per chapter id; re-adding replaces.
    pub async fn add(&self, download: &Download) -> Result<()> {
        let record = QueueRecord {
            series_id: download.series.id,
            chapter_id: download.chapter.id,
            order: self.counter.fetch_add(1, Ordering::Relaxed),
        };
        let value = serde_json::to_string(&record)?;
        self.db
            .put_record(&record.chapter_id.to_string(), &value)
            .await
    }

    /// Remove the record for a chapter
    pub async fn remove(&self, chapter_id: ChapterId) -> Result<()> {
        self.db.delete_record(&chapter_id.to_string()).await
    }

    /// Drain all records, oldest first, then clear the store.
    ///
    /// Called once at startup. Records that fail to decode are skipped with
    /// a warning — a corrupt row loses one queued download, not the queue.
    /// The caller re-persists whatever it successfully rebuilds, so the
    /// cleared table refills immediately.
    pub async fn restore(&self) -> Result<Vec<QueueRecord>> {
        let mut records: Vec<QueueRecord> = self
            .db
            .all_records()
            .await?
            .iter()
            .filter_map(|value| match serde_json::from_str(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable queue record");
                    None
                }
            })
            .collect();
        records.sort_by_key(|r| r.order);

        self.db.clear_records().await?;
        Ok(records)
    }

    /// Remove every record
    pub async fn clear(&self) -> Result<()> {
        self.db.clear_records().await
    }
}
