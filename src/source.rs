//! Source and catalog capabilities
//!
//! The download core never talks to a site directly — it consumes two
//! trait-object capabilities supplied by the embedding application:
//!
//! - [`Source`]: fetches the page list of a chapter and the bytes of a
//!   single page image.
//! - [`Catalog`]: resolves persisted series/chapter ids back into objects
//!   after a restart, and maps a series to its source.
//!
//! [`HttpSource`] is a reqwest-backed reference implementation for sources
//! whose chapter URL returns a plain JSON array of image URLs.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Result, SourceError};
use crate::types::{Chapter, ChapterId, Page, Series, SeriesId};

/// A fetched page image: raw bytes plus the content type the server reported
#[derive(Clone, Debug)]
pub struct ImageResponse {
    /// Raw image bytes
    pub bytes: Vec<u8>,
    /// `Content-Type` header value, if the server sent one
    pub content_type: Option<String>,
}

/// Capability for fetching chapter content from a remote site
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable, human-readable source name (also the top-level directory name)
    fn name(&self) -> &str;

    /// Fetch the ordered page list for a chapter
    async fn fetch_page_list(&self, chapter: &Chapter) -> Result<Vec<Page>>;

    /// Fetch the image bytes for a single page
    async fn fetch_image(&self, page: &Page) -> Result<ImageResponse>;
}

/// Capability for resolving ids back into domain objects.
///
/// Used during startup restore: persisted queue records only carry ids, and
/// a record whose series, chapter, or source no longer resolves is silently
/// dropped.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a series by id
    async fn series(&self, id: SeriesId) -> Option<Series>;

    /// Look up a chapter by id
    async fn chapter(&self, id: ChapterId) -> Option<Chapter>;

    /// Map a source key to its capability
    fn source(&self, source_id: i64) -> Option<Arc<dyn Source>>;
}

/// Reference [`Source`] implementation over HTTP.
///
/// Expects `Chapter::url` to return a JSON array of image URLs, e.g.
/// `["https://cdn.example.com/c12/1.jpg", ...]`. Page indices follow array
/// order.
pub struct HttpSource {
    name: String,
    client: reqwest::Client,
}

impl HttpSource {
    /// Create a new source with a default HTTP client
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a new source with a caller-supplied client (cookies, proxies, headers)
    pub fn with_client(name: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl Source for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_page_list(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        let base = url::Url::parse(&chapter.url).map_err(|e| SourceError::PageList {
            chapter: chapter.name.clone(),
            reason: format!("invalid chapter URL '{}': {}", chapter.url, e),
        })?;

        let response = self
            .client
            .get(base.clone())
            .send()
            .await
            .map_err(SourceError::Http)?;

        if !response.status().is_success() {
            return Err(SourceError::PageList {
                chapter: chapter.name.clone(),
                reason: format!("HTTP {}", response.status()),
            }
            .into());
        }

        let urls: Vec<String> = response.json().await.map_err(|e| SourceError::PageList {
            chapter: chapter.name.clone(),
            reason: e.to_string(),
        })?;

        // Entries may be relative to the chapter URL
        let mut pages = Vec::with_capacity(urls.len());
        for (i, entry) in urls.into_iter().enumerate() {
            let image_url = base.join(&entry).map_err(|e| SourceError::PageList {
                chapter: chapter.name.clone(),
                reason: format!("invalid image URL '{}': {}", entry, e),
            })?;
            pages.push(Page::new(i as u32, Some(image_url.to_string())));
        }
        Ok(pages)
    }

    async fn fetch_image(&self, page: &Page) -> Result<ImageResponse> {
        let url = page
            .image_url
            .as_deref()
            .ok_or(SourceError::MissingImageUrl { page: page.index })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(SourceError::Http)?;

        if !response.status().is_success() {
            return Err(SourceError::Image {
                page: page.index,
                reason: format!("HTTP {}", response.status()),
            }
            .into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response.bytes().await.map_err(SourceError::Http)?;

        Ok(ImageResponse {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
