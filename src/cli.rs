//! Command-line interface definitions for SnowBytes.
//!
//! Every option can be supplied as a flag or through the environment, which
//! is how the scheduled job receives its secrets.

use crate::error::{Error, Result};
use chrono::FixedOffset;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the SnowBytes job.
///
/// # Examples
///
/// ```sh
/// # Everything from the environment
/// GOOGLE_CHAT_WEBHOOK=... SNOWFLAKE_ACCOUNT=... SNOWFLAKE_TOKEN=... snowbytes
///
/// # Override the enrichment model through a settings file
/// snowbytes -c ./snowbytes.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Medium publication whose posts are scraped
    #[arg(long, env = "SNOWBYTES_BASE_URL", default_value = "https://medium.com/snowflake")]
    pub base_url: String,

    /// Maximum number of article links taken from the listing page
    #[arg(long, env = "SNOWBYTES_LIMIT", default_value_t = 20)]
    pub limit: usize,

    /// Optional path to a YAML settings file (enrichment model, rates, branding)
    #[arg(short, long, env = "SNOWBYTES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Google Chat incoming webhook URL
    #[arg(long, env = "GOOGLE_CHAT_WEBHOOK", hide_env_values = true)]
    pub webhook_url: String,

    /// Snowflake account identifier (e.g. ORG-ACCOUNT)
    #[arg(long, env = "SNOWFLAKE_ACCOUNT")]
    pub snowflake_account: String,

    /// Snowflake user the token belongs to
    #[arg(long, env = "SNOWFLAKE_USER")]
    pub snowflake_user: Option<String>,

    /// Bearer token for the Snowflake SQL API
    #[arg(long, env = "SNOWFLAKE_TOKEN", hide_env_values = true)]
    pub snowflake_token: String,

    /// Kind of token in SNOWFLAKE_TOKEN (PROGRAMMATIC_ACCESS_TOKEN, OAUTH or KEYPAIR_JWT)
    #[arg(long, env = "SNOWFLAKE_TOKEN_TYPE", default_value = "PROGRAMMATIC_ACCESS_TOKEN")]
    pub snowflake_token_type: String,

    /// Role used for every statement
    #[arg(long, env = "SNOWFLAKE_ROLE")]
    pub snowflake_role: Option<String>,

    #[arg(long, env = "SNOWFLAKE_WAREHOUSE", default_value = "COMPUTE_WH")]
    pub snowflake_warehouse: String,

    #[arg(long, env = "SNOWFLAKE_DATABASE", default_value = "SNOWBYTE")]
    pub snowflake_database: String,

    #[arg(long, env = "SNOWFLAKE_SCHEMA", default_value = "DEV")]
    pub snowflake_schema: String,

    /// Base URL of the SQL API when it is not `https://<account>.snowflakecomputing.com/`
    /// (private link, proxy)
    #[arg(long, env = "SNOWFLAKE_URL")]
    pub snowflake_url: Option<String>,

    /// Pause between status checks of a running statement, in seconds
    #[arg(long, env = "SNOWFLAKE_POLL_SECS", default_value_t = 2)]
    pub snowflake_poll_secs: u64,

    /// Attempts per chat message before giving up
    #[arg(long, env = "SNOWBYTES_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: u32,

    /// Pause between article requests, in seconds
    #[arg(long, default_value_t = 1)]
    pub scrape_delay_secs: u64,

    /// Pause between chat messages, in seconds
    #[arg(long, default_value_t = 5)]
    pub notify_delay_secs: u64,

    /// UTC offset, in minutes, used for stored capture times
    #[arg(long, env = "SNOWBYTES_UTC_OFFSET_MINUTES", default_value_t = 330, allow_hyphen_values = true)]
    pub utc_offset_minutes: i32,
}

impl Cli {
    /// Offset used for capture times.
    ///
    /// # Returns
    ///
    /// `Error::Config` when `utc_offset_minutes` is not strictly within
    /// ±24 hours.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::Config(format!(
                    "UTC offset of {} minutes is out of range",
                    self.utc_offset_minutes
                ))
            })
    }
}
