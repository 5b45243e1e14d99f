//! Data models for scraped and enriched blog posts.
//!
//! - [`ArticleRecord`]: one row of the `MEDIUM_BLOG_DATA` table
//! - [`CONTENT_ERROR`] / [`NOT_AVAILABLE`]: sentinels written when scraping fails
//!
//! Rows travel to and from the warehouse as bind variables and result cells,
//! see `warehouse::snowflake`.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

/// Content stored when an article page could not be fetched or parsed.
///
/// Rows carrying this marker are never sent to enrichment.
pub const CONTENT_ERROR: &str = "Error";

/// Title or content stored when the page loaded but the element was missing.
pub const NOT_AVAILABLE: &str = "N/A";

/// A blog post as persisted in the warehouse.
///
/// Rows are written with every summary field empty; enrichment fills them in
/// place afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    /// Upper-cased, normalized headline. Doubles as the dedup key.
    pub title: String,
    /// Normalized body text, or one of the sentinels.
    pub content: String,
    /// Canonical article URL.
    pub url: String,
    /// `og:image` of the article, or the configured fallback.
    pub image_url: String,
    /// Capture time.
    pub load_time: DateTime<FixedOffset>,
    /// Short synopsis produced by enrichment.
    pub summary: Option<String>,
    /// Long-form synopsis produced by enrichment.
    pub complete_summary: Option<String>,
    pub summary_tokens: Option<i64>,
    pub summary_credits: Option<Decimal>,
    pub complete_tokens: Option<i64>,
    pub complete_credits: Option<Decimal>,
}

impl ArticleRecord {
    /// A freshly scraped row, not yet enriched.
    pub fn scraped(
        title: String,
        content: String,
        url: String,
        image_url: String,
        load_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            title,
            content,
            url,
            image_url,
            load_time,
            summary: None,
            complete_summary: None,
            summary_tokens: None,
            summary_credits: None,
            complete_tokens: None,
            complete_credits: None,
        }
    }

    /// Whether the scrape of this article failed outright.
    pub fn is_scrape_error(&self) -> bool {
        self.content == CONTENT_ERROR
    }

    /// Eligible for the enrichment `UPDATE`.
    pub fn needs_enrichment(&self) -> bool {
        self.summary.is_none() && !self.is_scrape_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> ArticleRecord {
        ArticleRecord::scraped(
            "TITLE".to_string(),
            content.to_string(),
            "https://medium.com/snowflake/post".to_string(),
            "https://example.com/img.png".to_string(),
            DateTime::parse_from_rfc3339("2025-05-06T10:00:00+05:30").unwrap(),
        )
    }

    #[test]
    fn test_scraped_record_has_no_summary() {
        let r = record("Body");
        assert!(r.summary.is_none());
        assert!(r.complete_summary.is_none());
        assert!(r.summary_tokens.is_none());
        assert!(r.complete_credits.is_none());
    }

    #[test]
    fn test_error_rows_never_need_enrichment() {
        assert!(!record(CONTENT_ERROR).needs_enrichment());
        assert!(record("Body").needs_enrichment());
        assert!(record(NOT_AVAILABLE).needs_enrichment());
    }

    #[test]
    fn test_enriched_rows_do_not_need_enrichment() {
        let mut r = record("Body");
        r.summary = Some("Short".to_string());
        assert!(!r.needs_enrichment());
    }
}
