//! Google Chat card rendering.
//!
//! Rendering is pure: the same article and settings always produce the same
//! payload. Only the title, summary, article URL and image vary; the rest of
//! the card is fixed branding.

use crate::config::{Branding, Settings};
use crate::models::ArticleRecord;
use crate::utils::{normalize_text, truncate_chars};
use serde_json::{json, Value};

/// Longest title shown on a card, in characters.
pub const MAX_TITLE_CHARS: usize = 200;
/// Longest summary shown on a card, in characters.
pub const MAX_SUMMARY_CHARS: usize = 4000;
/// Shown when an article has no summary.
pub const SUMMARY_PLACEHOLDER: &str = "Summary not available.";

/// The variable parts of a card, already sanitized.
#[derive(Debug, Clone, PartialEq)]
pub struct BlogCard {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub image_url: String,
}

impl BlogCard {
    pub fn new(article: &ArticleRecord, fallback_image_url: &str) -> Self {
        Self {
            title: render_title(&article.title),
            summary: render_summary(article.summary.as_deref()),
            url: article.url.clone(),
            image_url: render_image_url(&article.image_url, fallback_image_url),
        }
    }

    pub fn from_settings(article: &ArticleRecord, settings: &Settings) -> Self {
        Self::new(article, &settings.fallback_image_url)
    }

    /// Build the `cardsV2` webhook payload.
    pub fn to_payload(&self, branding: &Branding) -> Value {
        json!({
            "cardsV2": [{
                "cardId": "new_blog_card",
                "card": {
                    "header": {
                        "title": branding.title,
                        "subtitle": branding.subtitle,
                        "imageUrl": branding.logo_url,
                        "imageType": "CIRCLE"
                    },
                    "sections": [{
                        "collapsible": false,
                        "uncollapsibleWidgetsCount": 1,
                        "widgets": [
                            { "textParagraph": { "text": format!("<b>{}</b>", self.title) } },
                            { "divider": {} },
                            { "decoratedText": { "icon": { "knownIcon": "DESCRIPTION" }, "text": "Summary" } },
                            { "textParagraph": { "text": format!(
                                "{}<br><br><b>🔗<a href=\"{}\">Read Full Article</a></b>",
                                self.summary, self.url
                            ) } },
                            { "image": {
                                "imageUrl": self.image_url,
                                "onClick": { "openLink": { "url": self.url } }
                            } },
                            { "divider": {} },
                            { "textParagraph": { "text": branding.footer } }
                        ]
                    }]
                }
            }]
        })
    }
}

fn render_title(title: &str) -> String {
    truncate_chars(&normalize_text(title.trim()), MAX_TITLE_CHARS)
}

fn render_summary(summary: Option<&str>) -> String {
    match summary {
        Some(s) if !s.trim().is_empty() => {
            let normalized = normalize_text(s.trim());
            let escaped = html_escape::encode_quoted_attribute(&normalized).replace('\n', "<br>");
            truncate_chars(&escaped, MAX_SUMMARY_CHARS)
        }
        _ => SUMMARY_PLACEHOLDER.to_string(),
    }
}

fn render_image_url(image_url: &str, fallback: &str) -> String {
    if image_url.trim().is_empty() {
        fallback.to_string()
    } else {
        image_url.to_string()
    }
}
