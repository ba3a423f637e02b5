//! Core types for chapter-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::source::Source;

/// Unique identifier for a series
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesId(pub i64);

impl std::fmt::Display for SeriesId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SeriesId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a chapter
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterId(pub i64);

impl std::fmt::Display for ChapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChapterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A series (the owning collection a chapter belongs to)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Unique series identifier
    pub id: SeriesId,
    /// Key of the source capability this series is read from
    pub source: i64,
    /// Series title (used for the on-disk directory name)
    pub title: String,
}

/// A chapter within a series
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Unique chapter identifier
    pub id: ChapterId,
    /// Chapter name (used for the on-disk directory name)
    pub name: String,
    /// Source URL the page list is fetched from
    pub url: String,
    /// Position of the chapter in the source's listing (descending enqueue order)
    pub source_order: i32,
}

/// Status of a single download work item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Created but not yet submitted to the execution engine
    NotDownloaded,
    /// Waiting in the queue for a free download slot
    Queued,
    /// Pipeline is actively fetching pages
    Downloading,
    /// All pages verified and the chapter directory committed
    Downloaded,
    /// Failed, interrupted, or did not pass verification
    Error,
}

impl DownloadStatus {
    /// Whether the item has reached a terminal state.
    ///
    /// Mirrors the queue-drain check: an item still counts as outstanding
    /// while it is NotDownloaded, Queued, or Downloading.
    pub fn is_finished(self) -> bool {
        matches!(self, DownloadStatus::Downloaded | DownloadStatus::Error)
    }
}

/// Status of a single page within a download
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Not yet processed
    Queued,
    /// Image bytes are being fetched
    Fetching,
    /// Image stored on disk under its final name
    Ready,
    /// Fetch or write failed after retries
    Error,
}

/// A single content page of a chapter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based index; ordering is stable across runs
    pub index: u32,
    /// Remote image URL (None means the page cannot be fetched)
    pub image_url: Option<String>,
    /// Local file once the image has been materialized
    pub uri: Option<PathBuf>,
    /// Current page status
    pub status: PageStatus,
    /// Transfer progress percentage (0 or 100; no streaming granularity)
    pub progress: u32,
}

impl Page {
    /// Create a new queued page
    pub fn new(index: u32, image_url: Option<String>) -> Self {
        Self {
            index,
            image_url,
            uri: None,
            status: PageStatus::Queued,
            progress: 0,
        }
    }
}

/// A download work item: one chapter to fetch and commit to disk.
///
/// Mutated only by the orchestrator and the single worker task that owns the
/// item while it is in flight; shared via [`DownloadHandle`].
pub struct Download {
    /// The owning series
    pub series: Arc<Series>,
    /// The chapter to download
    pub chapter: Chapter,
    /// Source capability used for page-list and image fetches
    pub source: Arc<dyn Source>,
    /// Current status
    pub status: DownloadStatus,
    /// Page list, None until fetched (kept across runs for resume)
    pub pages: Option<Vec<Page>>,
    /// Count of pages materialized on disk so far
    pub downloaded_images: usize,
    /// Sum of per-page progress after the last pipeline run
    pub total_progress: u32,
    /// Final chapter directory; assigned exactly once, before execution.
    /// Writes never land here directly — they go to the staging sibling and
    /// arrive via a single atomic rename.
    pub directory: PathBuf,
}

/// Shared handle to a [`Download`].
///
/// The mutex guards short field updates only; it is never held across an
/// await point.
pub type DownloadHandle = Arc<Mutex<Download>>;

impl Download {
    /// Create a new work item in the NotDownloaded state
    pub fn new(
        series: Arc<Series>,
        chapter: Chapter,
        source: Arc<dyn Source>,
        directory: PathBuf,
    ) -> Self {
        Self {
            series,
            chapter,
            source,
            status: DownloadStatus::NotDownloaded,
            pages: None,
            downloaded_images: 0,
            total_progress: 0,
            directory,
        }
    }

    /// Wrap the item in a shared handle
    pub(crate) fn into_handle(self) -> DownloadHandle {
        Arc::new(Mutex::new(self))
    }

    /// Read-only snapshot for observers
    pub fn info(&self) -> DownloadInfo {
        DownloadInfo {
            series_id: self.series.id,
            series_title: self.series.title.clone(),
            chapter_id: self.chapter.id,
            chapter_name: self.chapter.name.clone(),
            status: self.status,
            downloaded_pages: self.downloaded_images,
            total_pages: self.pages.as_ref().map(Vec::len),
            total_progress: self.total_progress,
        }
    }
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("series", &self.series.id)
            .field("chapter", &self.chapter.id)
            .field("status", &self.status)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a download for observers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    /// Owning series id
    pub series_id: SeriesId,
    /// Owning series title
    pub series_title: String,
    /// Chapter id
    pub chapter_id: ChapterId,
    /// Chapter name
    pub chapter_name: String,
    /// Current status
    pub status: DownloadStatus,
    /// Pages materialized so far
    pub downloaded_pages: usize,
    /// Total page count (None until the page list is known)
    pub total_pages: Option<usize>,
    /// Sum of per-page progress
    pub total_progress: u32,
}

/// Event emitted during the download lifecycle
///
/// Per item, events are ordered: `Queued` → zero-or-more `Progress` →
/// exactly one terminal observation (`Completed`, or a `Progress` whose
/// status is `Error`). `Error` events are out-of-band warnings and failure
/// notices.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The number of items in the queue changed
    QueueUpdated {
        /// New queue size
        size: usize,
    },

    /// An item was (re)submitted to the execution engine
    Queued {
        /// Snapshot of the item
        download: DownloadInfo,
    },

    /// An item made progress (page finished, or reached a terminal status)
    Progress {
        /// Snapshot of the item
        download: DownloadInfo,
    },

    /// An item finished successfully and left the queue
    Completed {
        /// Snapshot of the item
        download: DownloadInfo,
    },

    /// A warning or failure notice
    Error {
        /// Human-readable message
        message: String,
        /// Label for where the error happened (usually the chapter name)
        context: Option<String>,
    },
}
