use std::sync::Arc;

use serde::Deserialize;

use crate::discord::DiscordNotifier;
use crate::email::{EmailNotifier, SmtpSettings};
use crate::error::NotifyError;
use crate::Notifier;

fn yes() -> bool {
    true
}

/// Channel description, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifierConfig {
    Discord {
        webhook_url: String,
        #[serde(default = "yes")]
        mention_on_critical: bool,
        #[serde(default = "yes")]
        include_chart_link: bool,
    },
    Email {
        #[serde(flatten)]
        smtp: SmtpSettings,
        to_addresses: Vec<String>,
    },
}

pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config {
        NotifierConfig::Discord {
            webhook_url,
            mention_on_critical,
            include_chart_link,
        } => {
            if webhook_url.trim().is_empty() {
                return Err(NotifyError::Config("discord webhook_url is empty".into()));
            }
            let n = DiscordNotifier::new(webhook_url.clone())?
                .with_mention_on_critical(*mention_on_critical)
                .with_chart_link(*include_chart_link);
            Ok(Arc::new(n))
        }
        NotifierConfig::Email { smtp, to_addresses } => {
            Ok(Arc::new(EmailNotifier::new(smtp, to_addresses)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discord_defaults_to_mentions_and_charts() {
        let cfg: NotifierConfig = serde_json::from_value(json!({
            "type": "discord",
            "webhook_url": "https://discord.com/api/webhooks/1/x"
        }))
        .unwrap();

        assert_eq!(
            cfg,
            NotifierConfig::Discord {
                webhook_url: "https://discord.com/api/webhooks/1/x".into(),
                mention_on_critical: true,
                include_chart_link: true,
            }
        );
        assert_eq!(build_notifier(&cfg).unwrap().channel(), "discord");
    }

    #[test]
    fn email_settings_are_flattened() {
        let cfg: NotifierConfig = serde_json::from_value(json!({
            "type": "email",
            "host": "smtp.example.com",
            "from_address": "alerts@example.com",
            "to_addresses": ["me@example.com"]
        }))
        .unwrap();

        let NotifierConfig::Email { smtp, to_addresses } = cfg else {
            panic!("expected email config");
        };
        assert_eq!(smtp.port, 587);
        assert_eq!(to_addresses, vec!["me@example.com"]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let res: Result<NotifierConfig, _> =
            serde_json::from_value(json!({ "type": "pigeon", "webhook_url": "x" }));
        assert!(res.is_err());
    }

    #[test]
    fn empty_webhook_is_a_config_error() {
        let cfg = NotifierConfig::Discord {
            webhook_url: " ".into(),
            mention_on_critical: true,
            include_chart_link: true,
        };
        assert!(matches!(build_notifier(&cfg), Err(NotifyError::Config(_))));
    }
}
