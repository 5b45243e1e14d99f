//! # SnowBytes
//!
//! A scheduled job that scrapes the Snowflake publication on Medium, stores
//! new posts in a Snowflake table, summarizes them with Snowflake Cortex and
//! announces the fresh summaries in a Google Chat space.
//!
//! ## Usage
//!
//! ```sh
//! GOOGLE_CHAT_WEBHOOK=... SNOWFLAKE_ACCOUNT=... SNOWFLAKE_TOKEN=... snowbytes
//! ```
//!
//! ## Architecture
//!
//! The job runs once per invocation, strictly in sequence:
//! 1. **Scraping**: discover post URLs on the listing page and scrape each one
//! 2. **Dedup**: keep posts whose title is not stored yet
//! 3. **Persistence**: insert them, then let Cortex fill in the summaries
//! 4. **Notification**: post every post summarized in the last 24 hours as a
//!    chat card, retrying failed deliveries with exponential backoff

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dedup;
mod error;
mod models;
mod notifier;
mod pipeline;
mod recency;
mod retry;
mod scrapers;
mod utils;
mod warehouse;

use cli::Cli;
use config::Settings;
use notifier::{GoogleChatWebhook, Notifier};
use pipeline::{Pacing, Pipeline};
use scrapers::medium::MediumScraper;
use warehouse::snowflake::{SnowflakeConfig, SnowflakeWarehouse};

const USER_AGENT: &str = concat!("snowbytes/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ETL pipeline started");

    let args = Cli::parse();
    debug!(base_url = %args.base_url, limit = args.limit, config = ?args.config, "Parsed CLI arguments");

    let settings = Settings::load(args.config.as_deref()).await?;
    let offset = args.utc_offset()?;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(60))
        .build()?;

    let scraper = MediumScraper::new(
        client.clone(),
        &args.base_url,
        args.limit,
        settings.fallback_image_url.clone(),
        offset,
    )?;

    let warehouse = SnowflakeWarehouse::new(
        client.clone(),
        SnowflakeConfig {
            account: args.snowflake_account,
            user: args.snowflake_user,
            token: args.snowflake_token,
            token_type: args.snowflake_token_type,
            role: args.snowflake_role,
            warehouse: args.snowflake_warehouse,
            database: args.snowflake_database,
            schema: args.snowflake_schema,
            url: args.snowflake_url,
            poll_interval: Duration::from_secs(args.snowflake_poll_secs),
        },
    )?;
    info!(?warehouse, "Snowflake warehouse configured");

    let cortex = settings.cortex.clone();
    let notifier = Notifier::new(
        GoogleChatWebhook::new(client, args.webhook_url),
        settings,
        args.max_retries,
    );

    let pipeline = Pipeline {
        source: &scraper,
        warehouse: &warehouse,
        notifier: &notifier,
        cortex: &cortex,
        pacing: Pacing {
            scrape: Duration::from_secs(args.scrape_delay_secs),
            notify: Duration::from_secs(args.notify_delay_secs),
        },
        offset,
    };

    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Could not set up the warehouse table; aborting");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        discovered = report.discovered,
        scraped = report.scraped,
        new = report.new,
        inserted = report.inserted,
        enriched = report.enriched,
        sent = report.sent,
        failed = report.failed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "ETL pipeline complete"
    );

    Ok(())
}
