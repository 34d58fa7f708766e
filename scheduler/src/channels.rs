use std::sync::Arc;

use notifier::{Notifier, NotifierConfig, SmtpSettings, build_notifier};
use store::User;
use tracing::warn;

/// Resolves the delivery channels for one user.
pub trait ChannelBuilder: Send + Sync {
    fn for_user(&self, user: &User) -> Vec<Arc<dyn Notifier>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscordOptions {
    pub mention_on_critical: bool,
    pub include_chart_link: bool,
}

impl Default for DiscordOptions {
    fn default() -> Self {
        Self {
            mention_on_critical: true,
            include_chart_link: true,
        }
    }
}

/// Discord from the user's own webhook; email through the shared relay when
/// one is configured and the user has an address.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredChannels {
    pub discord: DiscordOptions,
    pub smtp: Option<SmtpSettings>,
}

impl ConfiguredChannels {
    pub fn configs_for(&self, user: &User) -> Vec<NotifierConfig> {
        let mut out = Vec::new();

        if let Some(url) = user.discord_webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            out.push(NotifierConfig::Discord {
                webhook_url: url.to_string(),
                mention_on_critical: self.discord.mention_on_critical,
                include_chart_link: self.discord.include_chart_link,
            });
        }

        if let (Some(smtp), Some(email)) = (&self.smtp, user.email.as_deref()) {
            out.push(NotifierConfig::Email {
                smtp: smtp.clone(),
                to_addresses: vec![email.to_string()],
            });
        }

        out
    }
}

impl ChannelBuilder for ConfiguredChannels {
    fn for_user(&self, user: &User) -> Vec<Arc<dyn Notifier>> {
        self.configs_for(user)
            .iter()
            .filter_map(|cfg| match build_notifier(cfg) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(user_id = user.id, error = %e, "skipping unusable channel");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(webhook: Option<&str>, email: Option<&str>) -> User {
        User {
            id: 1,
            email: email.map(str::to_string),
            discord_webhook_url: webhook.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn smtp() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".into(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "alerts@example.com".into(),
        }
    }

    #[test]
    fn email_needs_both_relay_and_address() {
        let without_relay = ConfiguredChannels::default();
        assert!(
            without_relay
                .configs_for(&user(None, Some("me@example.com")))
                .is_empty()
        );

        let with_relay = ConfiguredChannels {
            smtp: Some(smtp()),
            ..Default::default()
        };
        assert_eq!(with_relay.configs_for(&user(None, Some("me@example.com"))).len(), 1);
        assert!(with_relay.configs_for(&user(None, None)).is_empty());
    }

    #[test]
    fn discord_uses_the_users_webhook() {
        let channels = ConfiguredChannels::default();
        let configs = channels.configs_for(&user(Some("https://discord.com/api/webhooks/9/t"), None));

        assert!(matches!(
            &configs[0],
            NotifierConfig::Discord { webhook_url, .. } if webhook_url == "https://discord.com/api/webhooks/9/t"
        ));
        assert!(channels.configs_for(&user(Some("  "), None)).is_empty());
    }

    #[test]
    fn invalid_channels_are_dropped() {
        let channels = ConfiguredChannels {
            smtp: Some(smtp()),
            ..Default::default()
        };
        // Address fails to parse, so no email notifier is built.
        assert!(channels.for_user(&user(None, Some("nope"))).is_empty());
    }
}
