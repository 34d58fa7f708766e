//! Alert delivery channels.

pub mod discord;
pub mod email;
pub mod error;
pub mod factory;

use async_trait::async_trait;
use engine::AlertEvent;

pub use discord::DiscordNotifier;
pub use email::{EmailNotifier, SmtpSettings};
pub use error::NotifyError;
pub use factory::{NotifierConfig, build_notifier};

/// Outcome of one delivery attempt. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    pub channel: &'static str,
    pub success: bool,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn ok(channel: &'static str) -> Self {
        Self {
            channel,
            success: true,
            error: None,
        }
    }

    pub fn failed(channel: &'static str, error: impl ToString) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn send(&self, alert: &AlertEvent) -> NotificationResult;
}
