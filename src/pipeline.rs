//! One run of the job, from scraping to chat notifications.
//!
//! 1. **Discovery**: article URLs from the listing page
//! 2. **Scraping**: each article, with a pause between requests
//! 3. **Dedup**: drop titles already in the warehouse
//! 4. **Persistence**: insert the new rows
//! 5. **Enrichment**: Cortex summaries for every eligible row
//! 6. **Notification**: post the last 24 hours of summaries to chat
//!
//! Steps 2 to 5 are skipped when there is nothing new, but notification
//! always runs against whatever is already eligible in the warehouse.

use crate::config::CortexParams;
use crate::dedup::filter_new;
use crate::error::Result;
use crate::models::ArticleRecord;
use crate::notifier::{Notifier, Webhook};
use crate::recency::select_recent;
use crate::scrapers::ArticleSource;
use crate::warehouse::Warehouse;
use chrono::{FixedOffset, Utc};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Pauses between outgoing requests.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub scrape: Duration,
    pub notify: Duration,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub scraped: usize,
    pub new: usize,
    pub inserted: u64,
    pub enriched: u64,
    pub sent: usize,
    pub failed: usize,
}

pub struct Pipeline<'a, S, W, H> {
    pub source: &'a S,
    pub warehouse: &'a W,
    pub notifier: &'a Notifier<H>,
    pub cortex: &'a CortexParams,
    pub pacing: Pacing,
    pub offset: FixedOffset,
}

impl<S, W, H> Pipeline<'_, S, W, H>
where
    S: ArticleSource,
    W: Warehouse,
    H: Webhook,
{
    /// Run every step once.
    ///
    /// Only a failure to set up the table aborts the run; every later step
    /// logs its errors and degrades.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        self.warehouse.ensure_table().await?;

        let urls = self.source.discover().await;
        report.discovered = urls.len();
        if urls.is_empty() {
            warn!("No blog URLs found; skipping ingestion");
        } else {
            let scraped = self.scrape(urls).await;
            report.scraped = scraped.len();
            self.ingest(scraped, &mut report).await;
        }

        let now = Utc::now().with_timezone(&self.offset);
        let recent = select_recent(self.warehouse, now).await;
        info!(count = recent.len(), "Sending blog summaries to chat");
        self.notify(&recent, &mut report).await;

        Ok(report)
    }

    async fn scrape(&self, urls: Vec<String>) -> Vec<ArticleRecord> {
        let pause = self.pacing.scrape;
        stream::iter(urls)
            .then(|url| async move {
                sleep(pause).await;
                self.source.fetch(&url).await
            })
            .collect()
            .await
    }

    async fn ingest(&self, scraped: Vec<ArticleRecord>, report: &mut RunReport) {
        let existing = match self.warehouse.existing_titles().await {
            Ok(titles) => titles,
            Err(e) => {
                warn!(error = %e, "Could not read existing titles; assuming none");
                Default::default()
            }
        };

        let new_rows = filter_new(scraped, &existing);
        report.new = new_rows.len();
        if new_rows.is_empty() {
            info!("No new blog posts to process");
            return;
        }
        let pending = new_rows.iter().filter(|r| r.needs_enrichment()).count();
        info!(count = new_rows.len(), pending, "Found new articles to ingest");

        match self.warehouse.insert_articles(&new_rows).await {
            Ok(inserted) => report.inserted = inserted,
            Err(e) => error!(error = %e, count = new_rows.len(), "Failed to insert new rows"),
        }

        match self.warehouse.enrich(self.cortex).await {
            Ok(enriched) => report.enriched = enriched,
            Err(e) => error!(error = %e, "Cortex enrichment failed"),
        }
    }

    async fn notify(&self, articles: &[ArticleRecord], report: &mut RunReport) {
        for (i, article) in articles.iter().enumerate() {
            if i > 0 {
                sleep(self.pacing.notify).await;
            }
            let outcome = self.notifier.deliver(article).await;
            debug!(title = %article.title, attempts = outcome.attempts(), sent = outcome.is_sent(), "Delivery finished");
            if outcome.is_sent() {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }
    }
}
