//! Configuration types for chapter-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the download manager
///
/// All fields have sensible defaults so `Config::default()` works out of the
/// box; consumers typically override `download_dir` and `database_path`.
///
/// `max_concurrent_downloads` is only the *initial* bound — the live value
/// can be changed at any time through
/// [`Downloader::set_concurrency`](crate::Downloader::set_concurrency)
/// without restarting in-flight work.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the download tree (default: "./downloads").
    /// Layout underneath is `<source>/<series>/<chapter>`.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Path of the SQLite database holding the persisted queue
    /// (default: "./downloads/queue.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Initial maximum number of chapters downloading concurrently (default: 1)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Maximum fetch attempts per page image before it is marked failed (default: 3)
    #[serde(default = "default_image_retry_attempts")]
    pub image_retry_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            database_path: default_database_path(),
            max_concurrent_downloads: default_max_concurrent(),
            image_retry_attempts: default_image_retry_attempts(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./downloads/queue.db")
}

fn default_max_concurrent() -> usize {
    1
}

fn default_image_retry_attempts() -> u32 {
    3
}
