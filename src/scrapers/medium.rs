//! Medium publication scraper.
//!
//! The listing page of a publication (e.g. `https://medium.com/snowflake`)
//! links its posts with relative URLs under the publication path, such as
//! `/snowflake/some-post-1a2b3c`. Follower pages live under the same path and
//! are skipped.

use super::ArticleSource;
use crate::error::{Error, Result};
use crate::models::{ArticleRecord, CONTENT_ERROR, NOT_AVAILABLE};
use crate::retry::{retry, RetryPolicy};
use crate::utils::normalize_text;
use chrono::{DateTime, FixedOffset, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info, instrument};
use url::Url;

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static HEADLINE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());

#[derive(Debug, Clone)]
pub struct MediumScraper {
    client: Client,
    base_url: Url,
    limit: usize,
    fallback_image_url: String,
    offset: FixedOffset,
}

impl MediumScraper {
    pub fn new(
        client: Client,
        base_url: &str,
        limit: usize,
        fallback_image_url: impl Into<String>,
        offset: FixedOffset,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            limit,
            fallback_image_url: fallback_image_url.into(),
            offset,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

impl ArticleSource for MediumScraper {
    #[instrument(level = "info", skip_all, fields(base_url = %self.base_url))]
    async fn discover(&self) -> Vec<String> {
        let listing = retry(
            RetryPolicy::default(),
            "medium listing",
            || self.get_text(self.base_url.as_str()),
            |e| matches!(e, Error::Http(_)),
        )
        .await;

        match listing {
            Ok(html) => {
                let urls = extract_article_links(&html, &self.base_url, self.limit);
                info!(count = urls.len(), "Indexed blog URLs");
                debug!(urls = ?urls, "Medium URLs");
                urls
            }
            Err(e) => {
                error!(error = %e, "Failed to extract blog URLs");
                Vec::new()
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> ArticleRecord {
        match self.get_text(url).await {
            Ok(html) => parse_article(&html, url, &self.fallback_image_url, self.now()),
            Err(e) => {
                error!(error = %e, "Failed to scrape article");
                ArticleRecord::scraped(
                    NOT_AVAILABLE.to_string(),
                    CONTENT_ERROR.to_string(),
                    url.to_string(),
                    self.fallback_image_url.clone(),
                    self.now(),
                )
            }
        }
    }
}

/// Absolute URLs of the posts linked from a listing page, first `limit` only.
pub fn extract_article_links(html: &str, base_url: &Url, limit: usize) -> Vec<String> {
    let prefix = format!("{}/", base_url.path().trim_end_matches('/'));
    let document = Html::parse_document(html);

    document
        .select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with(&prefix) && href.len() > prefix.len())
        .filter(|href| !href.contains("/followers"))
        .filter_map(|href| base_url.join(href).ok())
        .map(|url| url.to_string())
        .unique()
        .take(limit)
        .collect()
}

fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

/// Turn an article page into a record.
///
/// Missing headline or body become [`NOT_AVAILABLE`]; a missing or empty
/// `og:image` becomes the fallback image.
pub fn parse_article(
    html: &str,
    url: &str,
    fallback_image_url: &str,
    load_time: DateTime<FixedOffset>,
) -> ArticleRecord {
    let document = Html::parse_document(html);

    let title = document
        .select(&HEADLINE)
        .next()
        .map(|h1| normalize_text(&h1.text().collect::<String>().trim().to_uppercase()))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let content = document
        .select(&ARTICLE)
        .next()
        .map(|article| normalize_text(&stripped_text(article)))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let image_url = document
        .select(&OG_IMAGE)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .filter(|content| !content.trim().is_empty())
        .unwrap_or(fallback_image_url)
        .to_string();

    debug!(%title, bytes = content.len(), "Parsed Medium article");
    ArticleRecord::scraped(title, content, url.to_string(), image_url, load_time)
}
