use std::time::Duration;

use async_trait::async_trait;
use engine::{AlertEvent, Severity};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::debug;

use crate::discord::chart_url;
use crate::error::NotifyError;
use crate::{NotificationResult, Notifier};

const CHANNEL: &str = "email";

/// SMTP relay shared by every email recipient.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_address: String,
}

fn default_port() -> u16 {
    587
}

fn subject_prefix(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "[Info]",
        Severity::Warning => "[Warning]",
        Severity::Critical => "[CRITICAL]",
    }
}

fn html_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "#3498DB",
        Severity::Warning => "#FFA500",
        Severity::Critical => "#FF0000",
    }
}

pub fn subject(alert: &AlertEvent) -> String {
    format!(
        "{} TickerWatch Alert: {}",
        subject_prefix(alert.severity),
        alert.ticker
    )
}

pub fn text_body(alert: &AlertEvent) -> String {
    format!(
        "TickerWatch Stock Alert\n\n\
         Ticker: {}\n\
         Rule: {}\n\
         Price: ${:.2}\n\n\
         {}\n\n\
         Time: {}\n",
        alert.ticker,
        alert.rule_type.title(),
        alert.current_price,
        alert.message,
        alert.triggered_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn html_body(alert: &AlertEvent) -> String {
    let color = html_color(alert.severity);
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; margin: 0; padding: 20px;">
  <div style="border-left: 4px solid {color}; padding: 15px; background-color: #f9f9f9;">
    <div style="font-size: 24px; font-weight: bold; color: {color};">{ticker}</div>
    <div style="font-size: 18px; color: #333;">Current Price: ${price:.2}</div>
    <div style="margin: 15px 0; color: #555;">{message}</div>
    <div style="color: #888; font-size: 12px;">Rule: {rule}<br>Time: {time}</div>
    <div style="margin-top: 15px;"><a href="{chart}" style="color: {color};">View Chart on TradingView</a></div>
  </div>
</body>
</html>
"#,
        color = color,
        ticker = escape(&alert.ticker),
        price = alert.current_price,
        message = escape(&alert.message),
        rule = alert.rule_type.title(),
        time = alert.triggered_at.format("%Y-%m-%d %H:%M:%S UTC"),
        chart = chart_url(&alert.ticker),
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Sends alerts through an SMTP relay with STARTTLS.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn new(settings: &SmtpSettings, to: &[String]) -> Result<Self, NotifyError> {
        if to.is_empty() {
            return Err(NotifyError::Config("email notifier needs at least one recipient".into()));
        }

        let from: Mailbox = settings.from_address.parse()?;
        let to = to
            .iter()
            .map(|a| a.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .timeout(Some(Duration::from_secs(30)));

        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn message(&self, alert: &AlertEvent) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject(alert));

        for to in &self.to {
            builder = builder.to(to.clone());
        }

        Ok(builder.multipart(MultiPart::alternative_plain_html(
            text_body(alert),
            html_body(alert),
        ))?)
    }

    async fn deliver(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        let message = self.message(alert)?;
        let response = self.transport.send(message).await?;
        debug!(code = %response.code(), recipients = self.to.len(), "email accepted");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn send(&self, alert: &AlertEvent) -> NotificationResult {
        match self.deliver(alert).await {
            Ok(()) => NotificationResult::ok(CHANNEL),
            Err(e) => NotificationResult::failed(CHANNEL, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use engine::RuleKind;
    use serde_json::Map;

    fn alert(severity: Severity) -> AlertEvent {
        AlertEvent {
            ticker: "TSLA".into(),
            rule_type: RuleKind::VolumeSpike,
            message: "TSLA volume spike: 5.0x the average <unusual>".into(),
            severity,
            current_price: 251.3,
            triggered_at: Utc.with_ymd_and_hms(2025, 3, 14, 15, 30, 0).unwrap(),
            metadata: Map::new(),
        }
    }

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".into(),
            port: 587,
            username: "bot".into(),
            password: "secret".into(),
            from_address: "alerts@example.com".into(),
        }
    }

    #[test]
    fn subject_prefix_follows_severity() {
        assert_eq!(subject(&alert(Severity::Info)), "[Info] TickerWatch Alert: TSLA");
        assert_eq!(subject(&alert(Severity::Warning)), "[Warning] TickerWatch Alert: TSLA");
        assert_eq!(subject(&alert(Severity::Critical)), "[CRITICAL] TickerWatch Alert: TSLA");
    }

    #[test]
    fn bodies_carry_the_alert() {
        let a = alert(Severity::Critical);

        let text = text_body(&a);
        assert!(text.contains("Ticker: TSLA"));
        assert!(text.contains("Rule: Volume Spike"));
        assert!(text.contains("Price: $251.30"));
        assert!(text.contains("2025-03-14 15:30:00 UTC"));

        let html = html_body(&a);
        assert!(html.contains("#FF0000"));
        assert!(html.contains("&lt;unusual&gt;"));
        assert!(html.contains("https://www.tradingview.com/symbols/TSLA"));
    }

    #[tokio::test]
    async fn message_has_both_alternatives() {
        let n = EmailNotifier::new(&settings(), &["me@example.com".into()]).unwrap();
        let raw = String::from_utf8(n.message(&alert(Severity::Warning)).unwrap().formatted()).unwrap();

        assert!(raw.contains("Subject: [Warning] TickerWatch Alert: TSLA"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn rejects_bad_addresses_and_empty_recipients() {
        assert!(matches!(
            EmailNotifier::new(&settings(), &[]),
            Err(NotifyError::Config(_))
        ));
        assert!(matches!(
            EmailNotifier::new(&settings(), &["not-an-address".into()]),
            Err(NotifyError::Address(_))
        ));
    }
}
