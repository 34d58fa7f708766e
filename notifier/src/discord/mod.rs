pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use engine::{AlertEvent, Severity};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::NotifyError;
use crate::{NotificationResult, Notifier};
use types::{COLOR_CRITICAL, COLOR_INFO, COLOR_WARNING, Embed, EmbedField, WebhookPayload};

const CHANNEL: &str = "discord";

/// Upper bound on how long a rate-limited post waits before its one retry.
const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

pub fn severity_color(severity: Severity) -> u32 {
    match severity {
        Severity::Info => COLOR_INFO,
        Severity::Warning => COLOR_WARNING,
        Severity::Critical => COLOR_CRITICAL,
    }
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "ℹ️",
        Severity::Warning => "⚠️",
        Severity::Critical => "🚨",
    }
}

pub fn chart_url(ticker: &str) -> String {
    format!("https://www.tradingview.com/symbols/{ticker}")
}

/// Posts alerts to a Discord webhook as rich embeds.
#[derive(Clone)]
pub struct DiscordNotifier {
    http: Client,
    webhook_url: String,
    mention_on_critical: bool,
    include_chart_link: bool,
    max_retry_after: Duration,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
            mention_on_critical: true,
            include_chart_link: true,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        })
    }

    pub fn with_mention_on_critical(mut self, enabled: bool) -> Self {
        self.mention_on_critical = enabled;
        self
    }

    pub fn with_chart_link(mut self, enabled: bool) -> Self {
        self.include_chart_link = enabled;
        self
    }

    pub fn with_max_retry_after(mut self, cap: Duration) -> Self {
        self.max_retry_after = cap;
        self
    }

    pub fn payload(&self, alert: &AlertEvent) -> WebhookPayload {
        let mut fields = vec![
            EmbedField::new("Current Price", format!("${:.2}", alert.current_price), true),
            EmbedField::new("Rule", alert.rule_type.title(), true),
        ];

        if self.include_chart_link {
            fields.push(EmbedField::new(
                "Chart",
                format!("[TradingView]({})", chart_url(&alert.ticker)),
                true,
            ));
        }

        let content = (self.mention_on_critical && alert.severity == Severity::Critical)
            .then(|| "@here".to_string());

        WebhookPayload {
            content,
            embeds: vec![Embed {
                title: format!("{} {} Alert", severity_emoji(alert.severity), alert.ticker),
                description: alert.message.clone(),
                color: severity_color(alert.severity),
                fields,
                timestamp: Some(alert.triggered_at.to_rfc3339()),
            }],
        }
    }

    /// Posts a payload, honouring one `429 Retry-After` before giving up.
    #[instrument(skip(self, payload), level = "debug")]
    pub async fn post(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let mut resp = self.http.post(&self.webhook_url).json(payload).send().await?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after(resp.headers()).min(self.max_retry_after);
            warn!(wait_ms = wait.as_millis() as u64, "discord rate limited, retrying once");
            tokio::time::sleep(wait).await;
            resp = self.http.post(&self.webhook_url).json(payload).send().await?;
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "discord webhook accepted");
        Ok(())
    }
}

/// `Retry-After` in seconds (fractional allowed); one second when absent or
/// unparseable. Values too large for a `Duration` saturate.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX))
        .unwrap_or(Duration::from_secs(1))
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn send(&self, alert: &AlertEvent) -> NotificationResult {
        match self.post(&self.payload(alert)).await {
            Ok(()) => NotificationResult::ok(CHANNEL),
            Err(e) => NotificationResult::failed(CHANNEL, e),
        }
    }
}
