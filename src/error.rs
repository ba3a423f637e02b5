//! Error types for chapter-dl
//!
//! This module provides the error taxonomy for the library:
//! - Domain-specific error types (Store, Source)
//! - Context information (chapter name, page index, file path) where it
//!   helps diagnosis

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for chapter-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chapter-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Durable store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Source capability error (page list or image fetch)
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A directory that must exist before the operation could not be found
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Durable store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the backing database
    #[error("failed to connect to store: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Source capability errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote page list could not be fetched or decoded
    #[error("failed to fetch page list for '{chapter}': {reason}")]
    PageList {
        /// Chapter name the page list belongs to
        chapter: String,
        /// Why the fetch or decode failed
        reason: String,
    },

    /// The remote image could not be fetched
    #[error("failed to fetch image for page {page}: {reason}")]
    Image {
        /// Zero-based page index
        page: u32,
        /// Why the fetch failed
        reason: String,
    },

    /// The page carries no image URL to fetch
    #[error("page {page} has no image URL")]
    MissingImageUrl {
        /// Zero-based page index
        page: u32,
    },
}
