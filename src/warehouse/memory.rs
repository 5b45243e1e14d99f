//! In-memory [`Warehouse`] used by the pipeline tests.
//!
//! Enrichment is simulated: the summary is the first sentence of the content
//! and token counts are word counts.

use super::Warehouse;
use crate::config::CortexParams;
use crate::error::{Error, Result};
use crate::models::ArticleRecord;
use crate::recency::is_recent;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    pub rows: RefCell<Vec<ArticleRecord>>,
    pub fail_titles: Cell<bool>,
    pub fail_enrich: Cell<bool>,
    pub fail_recent: Cell<bool>,
    pub enrich_calls: Cell<usize>,
}

impl MemoryWarehouse {
    pub fn with_rows(rows: Vec<ArticleRecord>) -> Self {
        Self {
            rows: RefCell::new(rows),
            ..Self::default()
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.rows.borrow().iter().map(|r| r.title.clone()).collect()
    }
}

fn unavailable() -> Error {
    Error::warehouse("390100", "warehouse unavailable")
}

impl Warehouse for MemoryWarehouse {
    async fn ensure_table(&self) -> Result<()> {
        Ok(())
    }

    async fn existing_titles(&self) -> Result<HashSet<String>> {
        if self.fail_titles.get() {
            return Err(unavailable());
        }
        Ok(self.titles().into_iter().collect())
    }

    async fn insert_articles(&self, articles: &[ArticleRecord]) -> Result<u64> {
        self.rows.borrow_mut().extend_from_slice(articles);
        Ok(articles.len() as u64)
    }

    async fn enrich(&self, params: &CortexParams) -> Result<u64> {
        self.enrich_calls.set(self.enrich_calls.get() + 1);
        if self.fail_enrich.get() {
            return Err(unavailable());
        }
        let mut updated = 0;
        for row in self.rows.borrow_mut().iter_mut().filter(|r| r.needs_enrichment()) {
            let tokens = row.content.split_whitespace().count() as i64;
            let first_sentence = row.content.split('.').next().unwrap_or_default().trim();
            row.summary = Some(format!("{first_sentence}."));
            row.complete_summary = Some(row.content.clone());
            row.summary_tokens = Some(tokens);
            row.summary_credits = Some(params.summarize_credit * Decimal::from(tokens));
            row.complete_tokens = Some(tokens);
            row.complete_credits = Some(params.complete_credit * Decimal::from(tokens));
            updated += 1;
        }
        Ok(updated)
    }

    async fn recent_articles(&self, since: DateTime<FixedOffset>) -> Result<Vec<ArticleRecord>> {
        if self.fail_recent.get() {
            return Err(unavailable());
        }
        let mut recent: Vec<ArticleRecord> = self
            .rows
            .borrow()
            .iter()
            .filter(|r| is_recent(r, since))
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.load_time.cmp(&a.load_time));
        Ok(recent)
    }
}
