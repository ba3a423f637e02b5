//! Shared fixtures for downloader tests: a scriptable in-memory source and
//! catalog, plus helpers for building downloaders on a temp directory.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::Config;
use crate::error::{Result, SourceError};
use crate::source::{Catalog, ImageResponse, Source};
use crate::types::{Chapter, ChapterId, Event, Page, Series, SeriesId};

use super::Downloader;

/// Source key used by all test fixtures
pub(crate) const TEST_SOURCE_ID: i64 = 1;

/// Scriptable source: serves `pages_per_chapter` pages per chapter, with
/// injectable page-list failures, per-page image failures, and a gate that
/// holds image fetches open for concurrency/stop tests.
pub(crate) struct MockSource {
    pages_per_chapter: usize,
    failing_page_lists: Mutex<HashSet<i64>>,
    failing_pages: Mutex<HashSet<u32>>,
    page_list_calls: AtomicUsize,
    image_attempts: Mutex<HashMap<String, u32>>,
    active_fetches: AtomicUsize,
    max_active_fetches: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl MockSource {
    pub(crate) fn new(pages_per_chapter: usize) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            pages_per_chapter,
            failing_page_lists: Mutex::new(HashSet::new()),
            failing_pages: Mutex::new(HashSet::new()),
            page_list_calls: AtomicUsize::new(0),
            image_attempts: Mutex::new(HashMap::new()),
            active_fetches: AtomicUsize::new(0),
            max_active_fetches: AtomicUsize::new(0),
            gate,
        }
    }

    /// Make the page-list fetch fail for a chapter
    pub(crate) fn fail_page_list(&self, chapter_id: i64) {
        self.failing_page_lists.lock().unwrap().insert(chapter_id);
    }

    /// Make every image fetch for a page index fail
    pub(crate) fn fail_page(&self, index: u32) {
        self.failing_pages.lock().unwrap().insert(index);
    }

    /// Clear injected page failures
    pub(crate) fn heal_pages(&self) {
        self.failing_pages.lock().unwrap().clear();
    }

    /// Clear injected page-list failures
    pub(crate) fn heal_page_lists(&self) {
        self.failing_page_lists.lock().unwrap().clear();
    }

    /// Hold image fetches until [`release`](Self::release) is called
    pub(crate) fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held image fetches proceed
    pub(crate) fn release(&self) {
        self.gate.send_replace(true);
    }

    pub(crate) fn page_list_calls(&self) -> usize {
        self.page_list_calls.load(Ordering::SeqCst)
    }

    /// Fetch attempts recorded for a page of a chapter
    pub(crate) fn attempts(&self, chapter_id: i64, index: u32) -> u32 {
        let url = Self::image_url(chapter_id, index);
        self.image_attempts
            .lock()
            .unwrap()
            .get(&url)
            .copied()
            .unwrap_or(0)
    }

    /// Image fetches currently in flight
    pub(crate) fn active_fetches(&self) -> usize {
        self.active_fetches.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrent image fetches
    pub(crate) fn max_active_fetches(&self) -> usize {
        self.max_active_fetches.load(Ordering::SeqCst)
    }

    fn image_url(chapter_id: i64, index: u32) -> String {
        format!("mock://chapter/{chapter_id}/page/{index}")
    }
}

/// Minimal JPEG payload (magic bytes + filler)
pub(crate) const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];

#[async_trait]
impl Source for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_page_list(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        self.page_list_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_page_lists.lock().unwrap().contains(&chapter.id.0) {
            return Err(SourceError::PageList {
                chapter: chapter.name.clone(),
                reason: "injected page list failure".into(),
            }
            .into());
        }

        Ok((0..self.pages_per_chapter)
            .map(|i| {
                Page::new(
                    i as u32,
                    Some(Self::image_url(chapter.id.0, i as u32)),
                )
            })
            .collect())
    }

    async fn fetch_image(&self, page: &Page) -> Result<ImageResponse> {
        let url = page
            .image_url
            .clone()
            .ok_or(SourceError::MissingImageUrl { page: page.index })?;

        *self.image_attempts.lock().unwrap().entry(url).or_default() += 1;

        let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_fetches.fetch_max(active, Ordering::SeqCst);

        // Park here while the gate is closed
        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open).await.ok();

        self.active_fetches.fetch_sub(1, Ordering::SeqCst);

        if self.failing_pages.lock().unwrap().contains(&page.index) {
            return Err(SourceError::Image {
                page: page.index,
                reason: "injected image failure".into(),
            }
            .into());
        }

        Ok(ImageResponse {
            bytes: JPEG_BYTES.to_vec(),
            content_type: Some("image/jpeg".into()),
        })
    }
}

/// In-memory catalog for restore tests
#[derive(Default)]
pub(crate) struct MemoryCatalog {
    series: Mutex<HashMap<i64, Series>>,
    chapters: Mutex<HashMap<i64, Chapter>>,
    sources: Mutex<HashMap<i64, Arc<dyn Source>>>,
}

impl MemoryCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_series(&self, series: Series) {
        self.series.lock().unwrap().insert(series.id.0, series);
    }

    pub(crate) fn add_chapter(&self, chapter: Chapter) {
        self.chapters.lock().unwrap().insert(chapter.id.0, chapter);
    }

    pub(crate) fn add_source(&self, source_id: i64, source: Arc<dyn Source>) {
        self.sources.lock().unwrap().insert(source_id, source);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn series(&self, id: SeriesId) -> Option<Series> {
        self.series.lock().unwrap().get(&id.0).cloned()
    }

    async fn chapter(&self, id: ChapterId) -> Option<Chapter> {
        self.chapters.lock().unwrap().get(&id.0).cloned()
    }

    fn source(&self, source_id: i64) -> Option<Arc<dyn Source>> {
        self.sources.lock().unwrap().get(&source_id).cloned()
    }
}

pub(crate) fn test_series(id: i64) -> Series {
    Series {
        id: SeriesId(id),
        source: TEST_SOURCE_ID,
        title: format!("Series {id}"),
    }
}

pub(crate) fn test_chapter(id: i64, name: &str, source_order: i32) -> Chapter {
    Chapter {
        id: ChapterId(id),
        name: name.to_string(),
        url: format!("mock://chapter/{id}"),
        source_order,
    }
}

pub(crate) struct TestContext {
    pub(crate) downloader: Downloader,
    pub(crate) source: Arc<MockSource>,
    pub(crate) catalog: Arc<MemoryCatalog>,
    pub(crate) config: Config,
    pub(crate) temp_dir: tempfile::TempDir,
}

impl TestContext {
    /// Path of the committed directory for a chapter of `test_series`
    pub(crate) fn chapter_dir(&self, series: &Series, chapter: &Chapter) -> std::path::PathBuf {
        let series_dir = self
            .downloader
            .layout
            .series_dir("mock", series);
        crate::layout::StorageLayout::chapter_dir(&series_dir, chapter)
    }

    /// Path of the staging directory for a chapter of `test_series`
    pub(crate) fn staging_dir(&self, series: &Series, chapter: &Chapter) -> std::path::PathBuf {
        crate::layout::StorageLayout::staging_dir(&self.chapter_dir(series, chapter))
    }

    /// Build a second downloader over the same database and catalog,
    /// simulating a process restart
    pub(crate) async fn reopen(&self) -> Downloader {
        Downloader::new(self.config.clone(), self.catalog.clone())
            .await
            .unwrap()
    }
}

/// Build a downloader on a fresh temp directory with a mock source serving
/// `pages_per_chapter` pages
pub(crate) async fn create_test_downloader(pages_per_chapter: usize) -> TestContext {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MockSource::new(pages_per_chapter));
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_source(TEST_SOURCE_ID, source.clone());

    let config = Config {
        download_dir: temp_dir.path().join("downloads"),
        database_path: temp_dir.path().join("queue.db"),
        max_concurrent_downloads: 1,
        image_retry_attempts: 3,
    };

    let downloader = Downloader::new(config.clone(), catalog.clone()).await.unwrap();

    TestContext {
        downloader,
        source,
        catalog,
        config,
        temp_dir,
    }
}

/// Wait for the downloader to self-stop (running watch flips to false)
pub(crate) async fn wait_until_idle(downloader: &Downloader) {
    let mut running = downloader.running_watch();
    tokio::time::timeout(Duration::from_secs(60), running.wait_for(|r| !*r))
        .await
        .expect("downloader did not go idle in time")
        .expect("running watch closed");
}

/// Poll until a condition holds, panicking after ~5 seconds
pub(crate) async fn wait_for(mut condition: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// Drain every buffered event from a receiver
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
