use chrono::Utc;
use engine::RuleEngine;
use notifier::discord::types::{COLOR_HEALTHY, Embed, EmbedField, WebhookPayload};
use notifier::{DiscordNotifier, NotifyError};
use store::Repositories;

/// Snapshot of what the monitor is watching, posted on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub users: usize,
    pub tickers: Vec<String>,
    pub rules: Vec<String>,
}

impl HealthReport {
    pub async fn collect(repos: &Repositories) -> anyhow::Result<Self> {
        let users = repos.users.list_all().await?.len();
        let tickers = repos.watchlist.all_tickers().await?;

        let engine = RuleEngine::new();
        let rules = repos
            .rules
            .list_enabled()
            .await?
            .iter()
            .map(|cfg| match engine.create(cfg) {
                Ok(rule) => rule.summary(),
                Err(e) => format!("{} (invalid: {e})", cfg.rule_type),
            })
            .collect();

        Ok(Self {
            users,
            tickers,
            rules,
        })
    }

    pub fn payload(&self) -> WebhookPayload {
        let or_none = |s: String| if s.is_empty() { "None".to_string() } else { s };

        WebhookPayload {
            content: None,
            embeds: vec![Embed {
                title: "TickerWatch Health Check".into(),
                description: "System is running normally.".into(),
                color: COLOR_HEALTHY,
                fields: vec![
                    EmbedField::new("Users", self.users.to_string(), true),
                    EmbedField::new("Watchlist", or_none(self.tickers.join(", ")), true),
                    EmbedField::new("Rules", or_none(self.rules.join("\n")), false),
                ],
                timestamp: Some(Utc::now().to_rfc3339()),
            }],
        }
    }

    pub async fn post(&self, discord: &DiscordNotifier) -> Result<(), NotifyError> {
        discord.post(&self.payload()).await
    }
}
