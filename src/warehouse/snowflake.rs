//! Snowflake backend over the SQL REST API (`/api/v2/statements`).
//!
//! Statements are submitted with bind variables and a bearer token. Long
//! running statements (the Cortex `UPDATE` usually is one) answer `202` and
//! are polled through their status URL until they finish. Large result sets
//! arrive in partitions, which are fetched one after the other.

use super::{Warehouse, TABLE};
use crate::config::CortexParams;
use crate::error::{Error, Result};
use crate::models::ArticleRecord;
use crate::utils::truncate_for_log;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Server-side statement timeout, in seconds.
const STATEMENT_TIMEOUT_SECS: u64 = 600;

const COLUMNS: &str = "TITLE, CONTENT, URL, IMAGE_URL, LOAD_TIME, SUMMARY, COMPLETE_SUMMARY, \
SUMMARY_TOKENS, SUMMARY_CREDITS, COMPLETE_TOKENS, COMPLETE_CREDITS";

/// Connection parameters for one Snowflake account.
#[derive(Clone)]
pub struct SnowflakeConfig {
    pub account: String,
    pub user: Option<String>,
    pub token: String,
    pub token_type: String,
    pub role: Option<String>,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    /// Overrides the account URL, e.g. for private link endpoints.
    pub url: Option<String>,
    /// Pause between status checks of a running statement.
    pub poll_interval: Duration,
}

impl std::fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("token_type", &self.token_type)
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("url", &self.url)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl SnowflakeConfig {
    /// `https://<account>.snowflakecomputing.com/`, or `url` when set.
    pub fn account_url(&self) -> Result<Url> {
        if let Some(url) = &self.url {
            return Ok(Url::parse(url)?);
        }
        let account = self.account.trim().to_lowercase().replace('_', "-");
        if account.is_empty() {
            return Err(Error::Config("Snowflake account is empty".to_string()));
        }
        Ok(Url::parse(&format!("https://{account}.snowflakecomputing.com/"))?)
    }
}

/// A bind variable of the SQL API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: Option<String>,
}

impl Binding {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "TEXT",
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnType {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
    #[serde(default)]
    partition_info: Vec<serde_json::Value>,
}

/// Body of a `200` answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSet {
    #[serde(default)]
    statement_handle: String,
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

/// Body of a `202` answer, or of any failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryStatus {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    sql_state: Option<String>,
    statement_status_url: Option<String>,
}

/// Rows of a finished statement, addressable by column name.
#[derive(Debug, Default)]
pub struct Rows {
    columns: HashMap<String, usize>,
    data: Vec<Vec<Option<String>>>,
}

impl Rows {
    fn from_result(result: ResultSet, extra: Vec<Vec<Option<String>>>) -> Self {
        let columns = result
            .result_set_meta_data
            .map(|meta| {
                meta.row_type
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| (c.name.to_uppercase(), i))
                    .collect()
            })
            .unwrap_or_default();
        let mut data = result.data;
        data.extend(extra);
        Self { columns, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = *self.columns.get(column)?;
        self.data.get(row)?.get(idx)?.as_deref()
    }

    /// First cell of the first row; DML statements report affected rows there.
    pub fn affected_rows(&self) -> u64 {
        self.data
            .first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.as_deref())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

/// [`Warehouse`] backed by a Snowflake account.
#[derive(Debug, Clone)]
pub struct SnowflakeWarehouse {
    client: Client,
    base_url: Url,
    config: SnowflakeConfig,
}

impl SnowflakeWarehouse {
    pub fn new(client: Client, config: SnowflakeConfig) -> Result<Self> {
        let base_url = config.account_url()?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.config.token_type)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    fn statement_body(&self, statement: &str, bindings: &[Binding]) -> serde_json::Value {
        let mut body = json!({
            "statement": statement,
            "timeout": STATEMENT_TIMEOUT_SECS,
            "warehouse": self.config.warehouse,
            "database": self.config.database,
            "schema": self.config.schema,
        });
        if let Some(role) = &self.config.role {
            body["role"] = json!(role);
        }
        if !bindings.is_empty() {
            let numbered: BTreeMap<String, &Binding> = bindings
                .iter()
                .enumerate()
                .map(|(i, b)| ((i + 1).to_string(), b))
                .collect();
            body["bindings"] = json!(numbered);
        }
        body
    }

    /// Run one statement to completion and collect every partition.
    #[instrument(level = "debug", skip_all, fields(statement = %truncate_for_log(statement, 80)))]
    pub async fn execute(&self, statement: &str, bindings: &[Binding]) -> Result<Rows> {
        let url = self.base_url.join("api/v2/statements")?;
        let body = self.statement_body(statement, bindings);
        let mut response = self
            .authorized(self.client.post(url))
            .json(&body)
            .send()
            .await?;

        loop {
            match response.status() {
                StatusCode::OK => break,
                StatusCode::ACCEPTED => {
                    let status: QueryStatus = response.json().await?;
                    let status_url = status.statement_status_url.ok_or_else(|| {
                        Error::warehouse(status.code.clone(), "202 without statementStatusUrl")
                    })?;
                    debug!(%status_url, "Statement still running; polling");
                    sleep(self.config.poll_interval).await;
                    let url = self.base_url.join(&status_url)?;
                    response = self.authorized(self.client.get(url)).send().await?;
                }
                _ => return Err(failure(response).await),
            }
        }

        let result: ResultSet = response.json().await?;
        let partitions = result
            .result_set_meta_data
            .as_ref()
            .map(|meta| meta.partition_info.len())
            .unwrap_or(0);
        let extra = if partitions > 1 {
            self.fetch_partitions(&result.statement_handle, partitions).await?
        } else {
            Vec::new()
        };
        Ok(Rows::from_result(result, extra))
    }

    async fn fetch_partitions(
        &self,
        handle: &str,
        partitions: usize,
    ) -> Result<Vec<Vec<Option<String>>>> {
        let url = self.base_url.join(&format!("api/v2/statements/{handle}"))?;
        let chunks: Vec<Vec<Vec<Option<String>>>> = stream::iter(1..partitions)
            .then(|partition| {
                let url = url.clone();
                async move {
                    let response = self
                        .authorized(self.client.get(url))
                        .query(&[("partition", partition)])
                        .send()
                        .await?;
                    if response.status() != StatusCode::OK {
                        return Err(failure(response).await);
                    }
                    let chunk: ResultSet = response.json().await?;
                    Ok::<_, Error>(chunk.data)
                }
            })
            .try_collect()
            .await?;
        Ok(chunks.into_iter().flatten().collect())
    }
}

async fn failure(response: Response) -> Error {
    let http = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<QueryStatus>(&text) {
        Ok(status) => {
            let code = match status.sql_state {
                Some(state) => format!("{} (SQLSTATE {state})", status.code),
                None => status.code,
            };
            Error::warehouse(code, status.message)
        }
        Err(_) => Error::warehouse(format!("HTTP {}", http.as_u16()), truncate_for_log(&text, 300)),
    }
}

pub fn create_table_statement() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
    TITLE STRING,
    CONTENT STRING,
    URL STRING,
    IMAGE_URL STRING,
    LOAD_TIME STRING,
    SUMMARY STRING,
    COMPLETE_SUMMARY STRING,
    SUMMARY_TOKENS NUMBER,
    SUMMARY_CREDITS NUMBER(38,13),
    COMPLETE_TOKENS NUMBER,
    COMPLETE_CREDITS NUMBER(38,13)
)"
    )
}

/// Multi-row `INSERT` of the scraped columns with bind variables.
pub fn insert_statement(articles: &[ArticleRecord]) -> (String, Vec<Binding>) {
    let placeholders = vec!["(?, ?, ?, ?, ?)"; articles.len()].join(", ");
    let statement = format!(
        "INSERT INTO {TABLE} (TITLE, CONTENT, URL, IMAGE_URL, LOAD_TIME) VALUES {placeholders}"
    );
    let bindings = articles
        .iter()
        .flat_map(|a| {
            [
                Binding::text(&a.title),
                Binding::text(&a.content),
                Binding::text(&a.url),
                Binding::text(&a.image_url),
                Binding::text(a.load_time.to_rfc3339_opts(SecondsFormat::Micros, false)),
            ]
        })
        .collect();
    (statement, bindings)
}

fn sql_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// The bulk Cortex `UPDATE`.
///
/// Model and prompt are inlined as literals because Cortex needs them as
/// constants; single quotes are doubled.
pub fn enrichment_statement(params: &CortexParams) -> String {
    let model = sql_literal(&params.model);
    let prompt = sql_literal(&params.prompt);
    let sc = params.summarize_credit.normalize();
    let cc = params.complete_credit.normalize();
    format!(
        "UPDATE {TABLE} SET
    COMPLETE_SUMMARY = TRIM(SNOWFLAKE.CORTEX.COMPLETE('{model}', '{prompt}' || CONTENT)),
    SUMMARY = SNOWFLAKE.CORTEX.SUMMARIZE(CONTENT),
    SUMMARY_TOKENS = SNOWFLAKE.CORTEX.COUNT_TOKENS('summarize', CONTENT),
    SUMMARY_CREDITS = {sc} * SNOWFLAKE.CORTEX.COUNT_TOKENS('summarize', CONTENT),
    COMPLETE_TOKENS = SNOWFLAKE.CORTEX.COUNT_TOKENS('{model}', '{prompt}' || CONTENT),
    COMPLETE_CREDITS = {cc} * SNOWFLAKE.CORTEX.COUNT_TOKENS('{model}', '{prompt}' || CONTENT)
WHERE SUMMARY IS NULL AND CONTENT != 'Error'"
    )
}

pub fn recent_statement(since: DateTime<FixedOffset>) -> (String, Vec<Binding>) {
    let statement = format!(
        "SELECT {COLUMNS} FROM {TABLE} \
WHERE TO_TIMESTAMP_TZ(LOAD_TIME) >= TO_TIMESTAMP_TZ(?) AND SUMMARY IS NOT NULL \
ORDER BY TO_TIMESTAMP_TZ(LOAD_TIME) DESC"
    );
    let bindings = vec![Binding::text(since.to_rfc3339_opts(SecondsFormat::Secs, false))];
    (statement, bindings)
}

/// Map one result row back to an [`ArticleRecord`]; `None` when the row is unusable.
fn record_from_row(rows: &Rows, i: usize) -> Option<ArticleRecord> {
    let text = |column: &str| rows.get(i, column).map(str::to_string);
    let load_time = rows
        .get(i, "LOAD_TIME")
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())?;
    Some(ArticleRecord {
        title: text("TITLE")?,
        content: text("CONTENT").unwrap_or_default(),
        url: text("URL").unwrap_or_default(),
        image_url: text("IMAGE_URL").unwrap_or_default(),
        load_time,
        summary: text("SUMMARY"),
        complete_summary: text("COMPLETE_SUMMARY"),
        summary_tokens: rows.get(i, "SUMMARY_TOKENS").and_then(|n| n.parse().ok()),
        summary_credits: rows.get(i, "SUMMARY_CREDITS").and_then(|n| Decimal::from_str(n).ok()),
        complete_tokens: rows.get(i, "COMPLETE_TOKENS").and_then(|n| n.parse().ok()),
        complete_credits: rows
            .get(i, "COMPLETE_CREDITS")
            .and_then(|n| Decimal::from_str(n).ok()),
    })
}

impl Warehouse for SnowflakeWarehouse {
    #[instrument(level = "info", skip_all)]
    async fn ensure_table(&self) -> Result<()> {
        self.execute(&create_table_statement(), &[]).await?;
        info!(table = TABLE, "Table check/creation complete");
        Ok(())
    }

    #[instrument(level = "info", skip_all)]
    async fn existing_titles(&self) -> Result<HashSet<String>> {
        let rows = self.execute(&format!("SELECT TITLE FROM {TABLE}"), &[]).await?;
        let titles: HashSet<String> = (0..rows.len())
            .filter_map(|i| rows.get(i, "TITLE").map(str::to_string))
            .collect();
        info!(count = titles.len(), "Fetched existing titles");
        Ok(titles)
    }

    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    async fn insert_articles(&self, articles: &[ArticleRecord]) -> Result<u64> {
        if articles.is_empty() {
            return Ok(0);
        }
        let (statement, bindings) = insert_statement(articles);
        let inserted = self.execute(&statement, &bindings).await?.affected_rows();
        info!(inserted, "Inserted new rows");
        Ok(inserted)
    }

    #[instrument(level = "info", skip_all, fields(model = %params.model))]
    async fn enrich(&self, params: &CortexParams) -> Result<u64> {
        let updated = self
            .execute(&enrichment_statement(params), &[])
            .await?
            .affected_rows();
        info!(updated, "Cortex enrichment completed");
        Ok(updated)
    }

    #[instrument(level = "info", skip_all, fields(%since))]
    async fn recent_articles(&self, since: DateTime<FixedOffset>) -> Result<Vec<ArticleRecord>> {
        let (statement, bindings) = recent_statement(since);
        let rows = self.execute(&statement, &bindings).await?;
        let mut articles = Vec::with_capacity(rows.len());
        for i in 0..rows.len() {
            match record_from_row(&rows, i) {
                Some(article) => articles.push(article),
                None => warn!(row = i, "Skipping row with unreadable TITLE or LOAD_TIME"),
            }
        }
        Ok(articles)
    }
}
