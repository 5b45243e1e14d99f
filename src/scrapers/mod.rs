//! Blog scrapers.
//!
//! A scraper works in two phases:
//!
//! 1. **Discovery**: collect article URLs from a listing page
//! 2. **Fetching**: download one article and turn it into an [`ArticleRecord`]
//!
//! Neither phase fails: discovery degrades to an empty list and a failed
//! fetch yields a record carrying the [`CONTENT_ERROR`](crate::models::CONTENT_ERROR)
//! sentinel, which keeps it out of enrichment.
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | Medium publication | [`medium`] | Any `medium.com/<publication>` listing |

pub mod medium;

use crate::models::ArticleRecord;

/// Where raw articles come from.
pub trait ArticleSource {
    /// Article URLs found on the listing page, bounded by the source's limit.
    async fn discover(&self) -> Vec<String>;

    /// Scrape a single article.
    async fn fetch(&self, url: &str) -> ArticleRecord;
}
