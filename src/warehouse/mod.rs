//! Persistence and enrichment of blog posts.
//!
//! The [`Warehouse`] trait is the seam between the pipeline and the store:
//!
//! | Operation | Snowflake statement |
//! |-----------|---------------------|
//! | [`Warehouse::ensure_table`] | `CREATE TABLE IF NOT EXISTS MEDIUM_BLOG_DATA` |
//! | [`Warehouse::existing_titles`] | `SELECT TITLE` |
//! | [`Warehouse::insert_articles`] | `INSERT ... VALUES` with bind variables |
//! | [`Warehouse::enrich`] | bulk `UPDATE` calling Snowflake Cortex |
//! | [`Warehouse::recent_articles`] | summarized rows since a cutoff, newest first |
//!
//! Rows are written without summaries; enrichment fills them in place and
//! only touches rows where `SUMMARY IS NULL AND CONTENT != 'Error'`, so rows
//! that failed enrichment are picked up again on the next run.

#[cfg(test)]
pub mod memory;
pub mod snowflake;

use crate::config::CortexParams;
use crate::error::Result;
use crate::models::ArticleRecord;
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;

/// Name of the table holding scraped posts.
pub const TABLE: &str = "MEDIUM_BLOG_DATA";

pub trait Warehouse {
    /// Create the article table when it does not exist yet.
    async fn ensure_table(&self) -> Result<()>;

    /// Every title already stored.
    async fn existing_titles(&self) -> Result<HashSet<String>>;

    /// Append rows; returns the number of rows written.
    async fn insert_articles(&self, articles: &[ArticleRecord]) -> Result<u64>;

    /// Fill the summary columns of every eligible row; returns the number of rows updated.
    async fn enrich(&self, params: &CortexParams) -> Result<u64>;

    /// Rows with a summary captured at or after `since`, newest first.
    async fn recent_articles(&self, since: DateTime<FixedOffset>) -> Result<Vec<ArticleRecord>>;
}
