//! Optional YAML settings for enrichment and card rendering.
//!
//! Every field falls back to the built-in default, so a settings file only
//! needs to name what it overrides:
//!
//! ```yaml
//! cortex:
//!   model: llama3.1-70b
//!   complete_credit: "0.00000121"
//! fallback_image_url: https://example.com/snowflake.png
//! ```

use crate::error::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Image shown on cards for posts without an `og:image`.
pub const FALLBACK_IMAGE_URL: &str =
    "https://www.artefact.com/wp-content/uploads/2023/12/snowflake-medium-article-visual.png";

const DEFAULT_PROMPT: &str = "Summarize the content after ':-', it was blog content. Our motive is to summarize the whole content so that the reader gets quick insight on the blog. Make sure the summarized content should be within 150 words:-";

/// Parameters of the Cortex enrichment `UPDATE`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CortexParams {
    /// Model passed to `SNOWFLAKE.CORTEX.COMPLETE`.
    pub model: String,
    /// Prompt prefixed to the article content.
    pub prompt: String,
    /// Credits per token for `SUMMARIZE`.
    pub summarize_credit: Decimal,
    /// Credits per token for `COMPLETE`; depends on the model.
    pub complete_credit: Decimal,
}

impl Default for CortexParams {
    fn default() -> Self {
        Self {
            model: "mistral-large2".to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            // 0.10 credits per million tokens
            summarize_credit: Decimal::new(1, 7),
            // 1.95 credits per million tokens
            complete_credit: Decimal::new(195, 8),
        }
    }
}

/// Fixed branding of the chat card.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Branding {
    pub title: String,
    pub subtitle: String,
    pub logo_url: String,
    pub footer: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            title: "SnowBytes".to_string(),
            subtitle: "Latest Snowflake Blog From Medium".to_string(),
            logo_url: "https://media.licdn.com/dms/image/v2/D5612AQGXKCeRh4xFdw/article-cover_image-shrink_720_1280/article-cover_image-shrink_720_1280/0/1727556320033?e=2147483647&v=beta&t=dPcJdj3s7xMhjUKHjE8fF8cavBCNe7sbTAT1GGpbzq4".to_string(),
            footer: "<i>Summary generated using <a href=\"https://docs.snowflake.com/en/guides-overview-ai-features\">Snowflake Cortex AI</a> ❄️</i>".to_string(),
        }
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub cortex: CortexParams,
    pub fallback_image_url: String,
    pub branding: Branding,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cortex: CortexParams::default(),
            fallback_image_url: FALLBACK_IMAGE_URL.to_string(),
            branding: Branding::default(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let yaml = fs::read_to_string(path).await?;
                let settings = Self::from_yaml(&yaml)?;
                info!(path = %path.display(), model = %settings.cortex.model, "Loaded settings file");
                Ok(settings)
            }
            None => Ok(Self::default()),
        }
    }
}
