use chrono::{DateTime, Utc};
use market::SymbolKind;
use serde::{Deserialize, Serialize};

/// A tradable instrument known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub kind: SymbolKind,
    pub exchange: String,
    pub updated_at: DateTime<Utc>,
}

/// A subscriber and the channels alerts are delivered to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub email: Option<String>,
    pub discord_webhook_url: Option<String>,
}

/// Input to the cooldown gate.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub user_id: i64,
    pub symbol_id: i64,
    pub rule_type: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

/// One reserved (and possibly delivered) alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub user_id: i64,
    pub symbol_id: i64,
    pub rule_type: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    /// `None` until at least one channel accepted the alert.
    pub notified_at: Option<DateTime<Utc>>,
}
