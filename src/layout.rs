//! On-disk layout of the download tree.
//!
//! Downloads are stored under the path scheme
//! `<download root>/<source>/<series>/<chapter>`, every component sanitized
//! by [`naming::sanitize`](crate::naming::sanitize). While a chapter is
//! being fetched its files live in a staging sibling (`<chapter>_tmp`); the
//! final directory only ever appears through an atomic rename of the staging
//! directory, so the existence of a chapter directory always means the
//! chapter is complete.

use std::path::{Path, PathBuf};

use crate::naming::sanitize;
use crate::types::{Chapter, Series};

/// Suffix of the staging sibling a chapter is downloaded into
pub(crate) const STAGING_SUFFIX: &str = "_tmp";

/// Resolves directories for sources, series, and chapters.
///
/// Pure path composition plus existence checks — the only directory this
/// crate ever creates is the staging directory, immediately before a
/// pipeline run starts writing.
#[derive(Clone, Debug)]
pub struct StorageLayout {
    base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a layout rooted at the given download directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Root of the download tree
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory name for a source
    pub fn source_dir_name(source_name: &str) -> String {
        sanitize(source_name)
    }

    /// Directory name for a series
    pub fn series_dir_name(series: &Series) -> String {
        sanitize(series.title.trim_matches(['.', ' ']))
    }

    /// Directory name for a chapter
    pub fn chapter_dir_name(chapter: &Chapter) -> String {
        sanitize(chapter.name.trim_matches(['.', ' ']))
    }

    /// Directory a series downloads into: `<base>/<source>/<series>`
    pub fn series_dir(&self, source_name: &str, series: &Series) -> PathBuf {
        self.base_dir
            .join(Self::source_dir_name(source_name))
            .join(Self::series_dir_name(series))
    }

    /// Final directory of a chapter within its series directory
    pub fn chapter_dir(series_dir: &Path, chapter: &Chapter) -> PathBuf {
        series_dir.join(Self::chapter_dir_name(chapter))
    }

    /// Staging sibling of a chapter directory, used for in-progress writes
    pub fn staging_dir(chapter_dir: &Path) -> PathBuf {
        let name = chapter_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        chapter_dir.with_file_name(format!("{name}{STAGING_SUFFIX}"))
    }

    /// Whether a path exists on disk (false on inspection errors)
    pub async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Series directory if it already exists on disk
    pub async fn find_series_dir(&self, source_name: &str, series: &Series) -> Option<PathBuf> {
        let dir = self.series_dir(source_name, series);
        Self::exists(&dir).await.then_some(dir)
    }

    /// Final chapter directory if it already exists on disk (i.e. the
    /// chapter is fully downloaded)
    pub async fn find_chapter_dir(
        &self,
        source_name: &str,
        series: &Series,
        chapter: &Chapter,
    ) -> Option<PathBuf> {
        let dir = Self::chapter_dir(&self.series_dir(source_name, series), chapter);
        Self::exists(&dir).await.then_some(dir)
    }
}
