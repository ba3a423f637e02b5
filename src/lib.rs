//! # chapter-dl
//!
//! Embeddable chapter download manager for comic reader applications.
//!
//! ## Design Philosophy
//!
//! chapter-dl is designed to be:
//! - **Durable** - The queue survives process restarts
//! - **Isolated** - One bad page never takes down a chapter's siblings;
//!   one bad chapter never takes down the run
//! - **Atomic on disk** - A chapter directory exists under its final name
//!   only when it is complete
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use chapter_dl::{Catalog, Config, DownloadManager};
//!
//! # async fn example(catalog: Arc<dyn Catalog>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     download_dir: "/data/downloads".into(),
//!     database_path: "/data/downloads/queue.db".into(),
//!     ..Default::default()
//! };
//!
//! let manager = DownloadManager::new(config, catalog).await?;
//!
//! // Subscribe to events
//! let mut events = manager.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! // Enqueue chapters and run the queue
//! // manager.queue_chapters(&series, &chapters).await?;
//! manager.start().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// On-disk layout of the download tree
pub mod layout;
/// Composition root for embedding applications
pub mod manager;
/// Filesystem-safe directory naming
pub mod naming;
pub(crate) mod queue;
/// Retry logic with fixed exponential backoff
pub(crate) mod retry;
/// Source and catalog capabilities
pub mod source;
/// Durable queue records
pub mod store;
/// Core types and events
pub mod types;
pub(crate) mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use downloader::Downloader;
pub use error::{Error, Result, SourceError, StoreError};
pub use layout::StorageLayout;
pub use manager::DownloadManager;
pub use source::{Catalog, HttpSource, ImageResponse, Source};
pub use store::{DownloadStore, QueueRecord};
pub use types::{
    Chapter, ChapterId, Download, DownloadInfo, DownloadStatus, Event, Page, PageStatus, Series,
    SeriesId,
};
