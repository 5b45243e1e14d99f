//! Delivery of blog cards to a Google Chat webhook.
//!
//! # Delivery state machine
//!
//! Each article goes through `Attempting(1..=max_retries)` and ends in either
//! [`Outcome::Sent`] or [`Outcome::Exhausted`]:
//!
//! - HTTP 200 ends the delivery immediately.
//! - Any other status, or a transport error, counts as a failed attempt.
//!   429 and 5xx are logged as transient; other failures are logged as
//!   permanent but still retried.
//! - Before every retry (never before the first attempt) the notifier sleeps
//!   `min(2^attempt + jitter, 30)` seconds, with jitter uniform in `[0, 1)`.
//! - Exhaustion is logged together with the rendered payload and reported to
//!   the caller, which carries on with the next article.

pub mod card;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::ArticleRecord;
use card::BlogCard;
use rand::{rng, Rng};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Upper bound of a single backoff pause.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A chat webhook that accepts JSON payloads.
pub trait Webhook {
    /// POST `payload` and return the HTTP status code.
    async fn post(&self, payload: &Value) -> Result<u16>;
}

/// Google Chat incoming webhook over `reqwest`.
#[derive(Debug, Clone)]
pub struct GoogleChatWebhook {
    client: reqwest::Client,
    url: String,
}

impl GoogleChatWebhook {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl Webhook for GoogleChatWebhook {
    async fn post(&self, payload: &Value) -> Result<u16> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        Ok(response.status().as_u16())
    }
}

/// Why a single delivery attempt did not succeed.
#[derive(Debug)]
pub enum AttemptError {
    Status(u16),
    Transport(Error),
}

impl AttemptError {
    /// Rate limiting and server errors; everything else is most likely permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            AttemptError::Status(code) => *code == 429 || (500..600).contains(code),
            AttemptError::Transport(_) => true,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Status(code) => write!(f, "webhook answered HTTP {code}"),
            AttemptError::Transport(e) => write!(f, "{e}"),
        }
    }
}

/// Final state of a delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sent { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

impl Outcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Outcome::Sent { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Sent { attempts } | Outcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Pause taken after failed attempt number `attempt`.
///
/// `jitter` is expected in `[0, 1)` seconds. The result never exceeds
/// [`MAX_BACKOFF`].
pub fn backoff_delay(attempt: u32, jitter: f64) -> Duration {
    let exp = 2f64.powi(attempt.min(16) as i32);
    Duration::from_secs_f64((exp + jitter).min(MAX_BACKOFF.as_secs_f64()))
}

/// Renders cards and delivers them with bounded retries.
pub struct Notifier<H> {
    webhook: H,
    settings: Settings,
    max_retries: u32,
}

impl<H> fmt::Debug for Notifier<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl<H: Webhook> Notifier<H> {
    pub fn new(webhook: H, settings: Settings, max_retries: u32) -> Self {
        Self {
            webhook,
            settings,
            max_retries: max_retries.max(1),
        }
    }

    pub fn webhook(&self) -> &H {
        &self.webhook
    }

    /// Render the card for `article` and deliver it.
    ///
    /// The payload is rendered once and re-posted unchanged on every attempt.
    /// Attempts run from 1 to `max_retries`; only HTTP 200 ends the loop
    /// early. Failed attempts sleep [`backoff_delay`] before the next one,
    /// and exhaustion is logged at `error` with the full payload.
    ///
    /// # Arguments
    ///
    /// * `article` - A stored article; a missing summary renders the placeholder
    ///
    /// # Returns
    ///
    /// [`Outcome::Sent`] with the attempt that succeeded, or
    /// [`Outcome::Exhausted`] with the last failure. Delivery never returns an
    /// error so the caller can move on to the next article.
    #[instrument(level = "info", skip_all, fields(title = %article.title))]
    pub async fn deliver(&self, article: &ArticleRecord) -> Outcome {
        let card = BlogCard::from_settings(article, &self.settings);
        let payload = card.to_payload(&self.settings.branding);
        self.deliver_payload(&article.title, &payload).await
    }

    async fn deliver_payload(&self, title: &str, payload: &Value) -> Outcome {
        let t0 = Instant::now();
        let mut attempt = 1;

        loop {
            let err = match self.webhook.post(payload).await {
                Ok(200) => {
                    info!(
                        %title,
                        attempt,
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "Posted blog card"
                    );
                    return Outcome::Sent { attempts: attempt };
                }
                Ok(code) => AttemptError::Status(code),
                Err(e) => AttemptError::Transport(e),
            };

            if attempt >= self.max_retries {
                log_exhausted(title, attempt, &err, payload);
                return Outcome::Exhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                };
            }

            let jitter: f64 = rng().random_range(0.0..1.0);
            let delay = backoff_delay(attempt, jitter);
            warn!(
                %title,
                attempt,
                max = self.max_retries,
                transient = err.is_transient(),
                ?delay,
                error = %err,
                "Webhook delivery failed; backing off"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

fn log_exhausted(title: &str, attempts: u32, err: &AttemptError, payload: &Value) {
    error!(
        %title,
        attempts,
        error = %err,
        payload = %payload,
        "Webhook delivery exhausted retries"
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::DateTime;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tokio::time::Instant as TokioInstant;

    /// Answers with queued status codes; the last one repeats forever.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedWebhook {
        statuses: RefCell<VecDeque<u16>>,
        pub(crate) posted: RefCell<Vec<Value>>,
    }

    impl ScriptedWebhook {
        pub(crate) fn new(statuses: &[u16]) -> Self {
            Self {
                statuses: RefCell::new(statuses.iter().copied().collect()),
                posted: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.posted.borrow().len()
        }
    }

    impl Webhook for ScriptedWebhook {
        async fn post(&self, payload: &Value) -> Result<u16> {
            self.posted.borrow_mut().push(payload.clone());
            let mut statuses = self.statuses.borrow_mut();
            let code = if statuses.len() > 1 {
                statuses.pop_front().unwrap_or(200)
            } else {
                statuses.front().copied().unwrap_or(200)
            };
            Ok(code)
        }
    }

    struct FailingTransport;

    impl Webhook for FailingTransport {
        async fn post(&self, _payload: &Value) -> Result<u16> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))
        }
    }

    fn article() -> ArticleRecord {
        let mut a = ArticleRecord::scraped(
            "SNOWPARK TIPS".to_string(),
            "Body".to_string(),
            "https://medium.com/snowflake/snowpark-tips".to_string(),
            String::new(),
            DateTime::parse_from_rfc3339("2025-05-06T10:00:00+05:30").unwrap(),
        );
        a.summary = Some("Tips.".to_string());
        a
    }

    #[test]
    fn test_backoff_bounds() {
        for attempt in 1..=10 {
            for jitter in [0.0, 0.5, 0.999] {
                let d = backoff_delay(attempt, jitter).as_secs_f64();
                assert!(d <= 30.0, "attempt {attempt}: {d}");
                let floor = 2f64.powi(attempt as i32).min(30.0);
                assert!(d >= floor, "attempt {attempt}: {d}");
            }
        }
        assert_eq!(backoff_delay(1, 0.0), Duration::from_secs(2));
        assert_eq!(backoff_delay(4, 0.0), Duration::from_secs(16));
        assert_eq!(backoff_delay(5, 0.0), MAX_BACKOFF);
    }

    #[test]
    fn test_transient_classification() {
        assert!(AttemptError::Status(429).is_transient());
        assert!(AttemptError::Status(500).is_transient());
        assert!(AttemptError::Status(503).is_transient());
        assert!(!AttemptError::Status(400).is_transient());
        assert!(!AttemptError::Status(404).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_500_exhausts_after_max_retries() {
        let notifier = Notifier::new(ScriptedWebhook::new(&[500]), Settings::default(), 5);

        let outcome = notifier.deliver(&article()).await;

        assert!(!outcome.is_sent());
        assert_eq!(outcome.attempts(), 5);
        assert_eq!(notifier.webhook.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_500_then_200_is_sent_on_second_attempt() {
        let notifier = Notifier::new(ScriptedWebhook::new(&[500, 200]), Settings::default(), 5);

        let start = TokioInstant::now();
        let outcome = notifier.deliver(&article()).await;

        assert_eq!(outcome, Outcome::Sent { attempts: 2 });
        assert_eq!(notifier.webhook.calls(), 2);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2));
        assert!(waited < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_does_not_sleep() {
        let notifier = Notifier::new(ScriptedWebhook::new(&[200]), Settings::default(), 5);

        let start = TokioInstant::now();
        let outcome = notifier.deliver(&article()).await;

        assert_eq!(outcome, Outcome::Sent { attempts: 1 });
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_retried_too() {
        let notifier = Notifier::new(ScriptedWebhook::new(&[400]), Settings::default(), 3);

        let outcome = notifier.deliver(&article()).await;

        match outcome {
            Outcome::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("400"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_exhaust() {
        let notifier = Notifier::new(FailingTransport, Settings::default(), 2);

        let outcome = notifier.deliver(&article()).await;

        assert_eq!(outcome.attempts(), 2);
        assert!(!outcome.is_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_posts_the_same_payload() {
        let notifier = Notifier::new(ScriptedWebhook::new(&[503, 429, 200]), Settings::default(), 5);

        let outcome = notifier.deliver(&article()).await;

        assert_eq!(outcome, Outcome::Sent { attempts: 3 });
        let posted = notifier.webhook.posted.borrow();
        assert_eq!(posted[0], posted[2]);
        assert!(posted[0].to_string().contains("SNOWPARK TIPS"));
    }
}
