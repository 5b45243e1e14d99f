//! Selection of recently summarized articles for notification.

use crate::models::ArticleRecord;
use crate::warehouse::Warehouse;
use chrono::{DateTime, Duration, FixedOffset};
use tracing::{error, info, instrument};

/// Trailing window of articles worth announcing.
pub fn window() -> Duration {
    Duration::hours(24)
}

/// Whether `article` was captured at or after `since` and has a summary.
pub fn is_recent(article: &ArticleRecord, since: DateTime<FixedOffset>) -> bool {
    article.load_time >= since && article.summary.is_some()
}

/// Summarized articles captured within the last 24 hours, newest first.
///
/// A failing store yields an empty list: nothing gets announced this run,
/// but the caller carries on.
///
/// # Arguments
///
/// * `warehouse` - Store queried for rows with `LOAD_TIME >= now - 24h`
/// * `now` - Current time in the capture-time offset
///
/// # Returns
///
/// The matching articles as ordered by the store, or an empty list on error.
#[instrument(level = "info", skip_all, fields(%now))]
pub async fn select_recent<W: Warehouse>(
    warehouse: &W,
    now: DateTime<FixedOffset>,
) -> Vec<ArticleRecord> {
    let since = now - window();
    match warehouse.recent_articles(since).await {
        Ok(articles) => {
            info!(count = articles.len(), %since, "Fetched recent blogs");
            articles
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch recent blogs");
            Vec::new()
        }
    }
}
