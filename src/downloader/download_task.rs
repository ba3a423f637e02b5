//! Per-chapter download pipeline.
//!
//! One invocation of [`Downloader::download_chapter`] runs a chapter from
//! page-list resolution through the atomic commit:
//!
//! 1. Resolve the page list (reuse a previously fetched list on resume)
//! 2. Prepare the staging directory, dropping stale `.tmp` leftovers
//! 3. Fetch every page in index order — pages already on disk are skipped,
//!    failed pages are contained and never abort their siblings
//! 4. Verify page statuses and the on-disk file count, then rename the
//!    staging directory to its final name — the single commit point

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::layout::StorageLayout;
use crate::queue::lock_infallible;
use crate::retry;
use crate::source::Source;
use crate::types::{DownloadHandle, DownloadStatus, Event, Page, PageStatus};
use crate::utils::{TMP_EXTENSION, image_extension, page_filename};

use super::Downloader;

impl Downloader {
    /// Download one chapter. Never panics or returns an error — the outcome
    /// lands in the item's status, and failures are surfaced as events.
    pub(crate) async fn download_chapter(&self, handle: DownloadHandle) {
        let (source, chapter, directory, known_pages) = {
            let download = lock_infallible(&handle);
            (
                download.source.clone(),
                download.chapter.clone(),
                download.directory.clone(),
                download.pages.clone(),
            )
        };
        let staging = StorageLayout::staging_dir(&directory);

        // Resolve the page list: reuse what a previous run fetched, or pull
        // from the source
        let mut pages = match known_pages {
            Some(pages) => pages,
            None => match source.fetch_page_list(&chapter).await {
                Ok(pages) => {
                    lock_infallible(&handle).pages = Some(pages.clone());
                    pages
                }
                Err(e) => {
                    tracing::error!(
                        chapter_id = chapter.id.0,
                        error = %e,
                        "Failed to fetch page list"
                    );
                    lock_infallible(&handle).status = DownloadStatus::Error;
                    self.emit_event(Event::Error {
                        message: e.to_string(),
                        context: Some(chapter.name.clone()),
                    });
                    return;
                }
            },
        };
        pages.sort_by_key(|p| p.index);

        if let Err(e) = prepare_staging(&staging).await {
            tracing::error!(
                chapter_id = chapter.id.0,
                staging = %staging.display(),
                error = %e,
                "Failed to prepare staging directory"
            );
            lock_infallible(&handle).status = DownloadStatus::Error;
            self.emit_event(Event::Error {
                message: e.to_string(),
                context: Some(chapter.name.clone()),
            });
            return;
        }

        {
            let mut download = lock_infallible(&handle);
            download.downloaded_images = 0;
            download.status = DownloadStatus::Downloading;
        }

        // Fetch pages in index order; a failed page never aborts its siblings
        for page in pages {
            let page = self.fetch_page(source.as_ref(), page, &staging).await;

            let info = {
                let mut download = lock_infallible(&handle);
                if page.status == PageStatus::Ready {
                    download.downloaded_images += 1;
                }
                if let Some(slot) = download
                    .pages
                    .as_mut()
                    .and_then(|pages| pages.iter_mut().find(|p| p.index == page.index))
                {
                    *slot = page;
                }
                download.info()
            };
            self.emit_event(Event::Progress { download: info });
        }

        self.finalize_chapter(&handle, &staging, &directory, &chapter.name)
            .await;
    }

    /// Get one page image from the staging directory if it survives from an
    /// earlier run, or download it from the source.
    async fn fetch_page(&self, source: &dyn Source, mut page: Page, staging: &Path) -> Page {
        // A page without an image URL cannot be fetched; it stays unready
        // and the chapter fails verification
        if page.image_url.is_none() {
            return page;
        }

        let filename = page_filename(page.index);
        let tmp_path = staging.join(format!("{filename}.{TMP_EXTENSION}"));

        // Remove a stale temp file left by an interrupted attempt
        if StorageLayout::exists(&tmp_path).await
            && let Err(e) = tokio::fs::remove_file(&tmp_path).await
        {
            tracing::warn!(path = %tmp_path.display(), error = %e, "Failed to remove stale temp file");
        }

        // A finished file for this index means no network I/O is needed
        if let Some(existing) = find_page_file(staging, &filename).await {
            page.uri = Some(existing);
            page.progress = 100;
            page.status = PageStatus::Ready;
            return page;
        }

        page.status = PageStatus::Fetching;
        page.progress = 0;

        let attempts = self.config.image_retry_attempts;
        match retry::with_backoff(attempts, || {
            save_image(source, &page, staging, &filename, &tmp_path)
        })
        .await
        {
            Ok(path) => {
                page.uri = Some(path);
                page.progress = 100;
                page.status = PageStatus::Ready;
            }
            Err(e) => {
                tracing::error!(page = page.index, error = %e, "Page failed after retries");
                page.progress = 0;
                page.status = PageStatus::Error;
            }
        }
        page
    }

    /// Evaluate the finished run and commit on success.
    ///
    /// The rename of the staging directory is the single atomic commit
    /// point: the final chapter directory never exists unless every page is
    /// ready AND the staging directory holds one finished file per page.
    async fn finalize_chapter(
        &self,
        handle: &DownloadHandle,
        staging: &Path,
        directory: &Path,
        chapter_name: &str,
    ) {
        let pages = lock_infallible(handle).pages.clone().unwrap_or_default();

        let mut actual_progress = 0u32;
        let mut status = DownloadStatus::Downloaded;

        // A single unready page fails the whole chapter
        for page in &pages {
            actual_progress += page.progress;
            if page.status != PageStatus::Ready {
                status = DownloadStatus::Error;
            }
        }
        if status == DownloadStatus::Error {
            self.emit_event(Event::Error {
                message: "not every page could be downloaded".to_string(),
                context: Some(chapter_name.to_string()),
            });
        }

        // Data integrity check, independent of page statuses: the staging
        // directory must hold one finished file per page
        let finished = count_finished_files(staging).await;
        if finished < pages.len() {
            status = DownloadStatus::Error;
            self.emit_event(Event::Error {
                message: format!(
                    "chapter is missing downloaded pages ({finished} of {})",
                    pages.len()
                ),
                context: Some(chapter_name.to_string()),
            });
        }

        if status == DownloadStatus::Downloaded {
            if let Err(e) = tokio::fs::rename(staging, directory).await {
                tracing::error!(
                    staging = %staging.display(),
                    directory = %directory.display(),
                    error = %e,
                    "Failed to commit chapter directory"
                );
                status = DownloadStatus::Error;
                self.emit_event(Event::Error {
                    message: format!("failed to commit chapter directory: {e}"),
                    context: Some(chapter_name.to_string()),
                });
            } else {
                tracing::info!(directory = %directory.display(), "Chapter committed");
            }
        }

        let mut download = lock_infallible(handle);
        download.total_progress = actual_progress;
        download.status = status;
    }
}

/// Create the staging directory and delete `.tmp` leftovers from a prior
/// aborted attempt. Finished page files are kept — they are what makes a
/// rerun resumable.
async fn prepare_staging(staging: &Path) -> Result<()> {
    tokio::fs::create_dir_all(staging).await?;

    let mut entries = tokio::fs::read_dir(staging).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(&format!(".{TMP_EXTENSION}"))
            && let Err(e) = tokio::fs::remove_file(entry.path()).await
        {
            tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove leftover temp file");
        }
    }

    Ok(())
}

/// Fetch the image for a page and move it into place under its final
/// `NNN.<ext>` name. The temp file is removed on any failure so a retry
/// starts clean.
async fn save_image(
    source: &dyn Source,
    page: &Page,
    staging: &Path,
    filename: &str,
    tmp_path: &Path,
) -> Result<PathBuf> {
    let image = source.fetch_image(page).await?;

    let result: Result<PathBuf> = async {
        tokio::fs::write(tmp_path, &image.bytes).await?;
        let extension = image_extension(image.content_type.as_deref(), &image.bytes);
        let final_path = staging.join(format!("{filename}.{extension}"));
        tokio::fs::rename(tmp_path, &final_path).await?;
        Ok(final_path)
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(tmp_path).await;
    }
    result
}

/// Finished (non-temp) file for a page index, if one exists in staging
async fn find_page_file(staging: &Path, filename: &str) -> Option<PathBuf> {
    let prefix = format!("{filename}.");
    let tmp_suffix = format!(".{TMP_EXTENSION}");

    let mut entries = tokio::fs::read_dir(staging).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && !name.ends_with(&tmp_suffix) {
            return Some(entry.path());
        }
    }
    None
}

/// Number of finished (non-temp) files in the staging directory
async fn count_finished_files(staging: &Path) -> usize {
    let tmp_suffix = format!(".{TMP_EXTENSION}");
    let Ok(mut entries) = tokio::fs::read_dir(staging).await else {
        return 0;
    };

    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_name().to_string_lossy().ends_with(&tmp_suffix) {
            count += 1;
        }
    }
    count
}
