use std::path::Path;
use std::time::Duration;

use notifier::SmtpSettings;
use scheduler::{ConfiguredChannels, DiscordOptions, MonitorSettings};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub data_source: DataSourceConfig,
    pub schedule: ScheduleConfig,
    pub notifications: NotificationsConfig,
    pub advanced: AdvancedConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection string.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/tickerwatch.db".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Sessions fetched for the monthly high/low and average volume.
    pub history_days: u32,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: market::yahoo::DEFAULT_BASE_URL.into(),
            request_timeout_secs: 10,
            history_days: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub check_interval_minutes: u64,
    pub market_hours_only: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: 60,
            market_hours_only: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub discord: DiscordConfig,
    pub email: EmailConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Operator webhook used for health checks. Per-user alerts go to each
    /// user's own webhook.
    pub webhook_url: Option<String>,
    pub mention_on_critical: bool,
    pub include_chart_link: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            mention_on_critical: true,
            include_chart_link: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub alert_cooldown_hours: u64,
    pub max_concurrent_checks: usize,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            alert_cooldown_hours: 24,
            max_concurrent_checks: 5,
        }
    }
}

/// A week.
const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// A year.
const MAX_COOLDOWN_HOURS: u64 = 365 * 24;

impl AppConfig {
    /// Reads `path`, falling back to defaults when it does not exist, then
    /// applies `DATABASE_URL` / `DISCORD_WEBHOOK_URL` and validates.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok();

        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_toml(&text, lookup)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        cfg.apply_env(lookup);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses TOML, expanding `${VAR}` in every string value through `lookup`.
    /// Unset variables expand to the empty string.
    pub fn from_toml<F>(text: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw: toml::Value = toml::from_str(text)?;
        substitute(&mut raw, &lookup);

        let mut cfg: AppConfig = raw.try_into()?;
        // "${DISCORD_WEBHOOK_URL}" with the variable unset reads as no webhook.
        cfg.notifications.discord.webhook_url = cfg
            .notifications
            .discord
            .webhook_url
            .filter(|u| !u.trim().is_empty());
        Ok(cfg)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database.url = url;
        }
        if let Some(hook) = lookup("DISCORD_WEBHOOK_URL").filter(|v| !v.is_empty()) {
            self.notifications.discord.webhook_url = Some(hook);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.database.url.trim().is_empty() {
            return invalid("database.url is required");
        }
        if self.data_source.history_days == 0 {
            return invalid("data_source.history_days must be positive");
        }
        if self.data_source.request_timeout_secs == 0 {
            return invalid("data_source.request_timeout_secs must be positive");
        }
        if !(1..=MAX_CHECK_INTERVAL_MINUTES).contains(&self.schedule.check_interval_minutes) {
            return invalid("schedule.check_interval_minutes must be between 1 and 10080");
        }
        if !(1..=MAX_COOLDOWN_HOURS).contains(&self.advanced.alert_cooldown_hours) {
            return invalid("advanced.alert_cooldown_hours must be between 1 and 8760");
        }
        if self.advanced.max_concurrent_checks == 0 {
            return invalid("advanced.max_concurrent_checks must be positive");
        }

        let email = &self.notifications.email;
        if email.enabled {
            if email.smtp_host.trim().is_empty() {
                return invalid("notifications.email.smtp_host is required when email is enabled");
            }
            if email.smtp_port == 0 {
                return invalid("notifications.email.smtp_port must be non-zero");
            }
            if email.from_address.trim().is_empty() {
                return invalid(
                    "notifications.email.from_address is required when email is enabled",
                );
            }
        }

        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.check_interval_minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.data_source.request_timeout_secs)
    }

    pub fn monitor_settings(&self, dry_run: bool) -> MonitorSettings {
        MonitorSettings {
            cooldown: Duration::from_secs(self.advanced.alert_cooldown_hours.saturating_mul(3600)),
            history_days: self.data_source.history_days,
            max_concurrent_checks: self.advanced.max_concurrent_checks,
            market_hours_only: self.schedule.market_hours_only,
            dry_run,
        }
    }

    pub fn smtp(&self) -> Option<SmtpSettings> {
        let email = &self.notifications.email;
        email.enabled.then(|| SmtpSettings {
            host: email.smtp_host.clone(),
            port: email.smtp_port,
            username: email.username.clone(),
            password: email.password.clone(),
            from_address: email.from_address.clone(),
        })
    }

    pub fn channels(&self) -> ConfiguredChannels {
        let discord = &self.notifications.discord;
        ConfiguredChannels {
            discord: DiscordOptions {
                mention_on_critical: discord.mention_on_critical,
                include_chart_link: discord.include_chart_link,
            },
            smtp: self.smtp(),
        }
    }
}

fn substitute<F>(value: &mut toml::Value, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        toml::Value::String(s) => *s = expand(s, lookup),
        toml::Value::Array(items) => items.iter_mut().for_each(|v| substitute(v, lookup)),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| substitute(v, lookup)),
        _ => {}
    }
}

/// Replaces each `${NAME}`; an unterminated `${` is left as is.
fn expand<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                out.push_str(&lookup(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
