use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine::RuleConfig;
use market::{ListedSymbol, SymbolKind};
use sqlx::SqlitePool;

use crate::model::{AlertRecord, NewAlert, NewUser, Symbol, User};
use crate::repository_sqlx::{
    SqlxAlertHistoryRepository, SqlxRuleRepository, SqlxSymbolRepository, SqlxUserRepository,
    SqlxWatchlistRepository,
};

#[async_trait]
pub trait SymbolRepository: Send + Sync {
    async fn create(&self, symbol: &ListedSymbol) -> Result<Symbol>;

    async fn by_ticker(&self, ticker: &str) -> Result<Option<Symbol>>;

    async fn by_id(&self, id: i64) -> Result<Option<Symbol>>;

    async fn list_all(&self) -> Result<Vec<Symbol>>;

    async fn list_by_kind(&self, kind: SymbolKind) -> Result<Vec<Symbol>>;

    /// Case-insensitive substring match on ticker or name.
    async fn search(&self, query: &str) -> Result<Vec<Symbol>>;

    /// Inserts or refreshes by ticker and returns the stored row.
    async fn upsert(&self, symbol: &ListedSymbol) -> Result<Symbol>;

    /// Upserts every symbol in one transaction, returning how many were written.
    async fn bulk_upsert(&self, symbols: &[ListedSymbol]) -> Result<usize>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> Result<User>;

    async fn by_id(&self, id: i64) -> Result<Option<User>>;

    async fn update(&self, user: &User) -> Result<()>;

    /// Removes the user together with their watchlist, rules and history.
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn list_all(&self) -> Result<Vec<User>>;
}

#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// Returns `false` when the symbol was already on the list.
    async fn add(&self, user_id: i64, symbol_id: i64) -> Result<bool>;

    async fn remove(&self, user_id: i64, symbol_id: i64) -> Result<bool>;

    /// Symbols ordered by ticker.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Symbol>>;

    async fn contains(&self, user_id: i64, symbol_id: i64) -> Result<bool>;

    /// Distinct tickers watched by anyone.
    async fn all_tickers(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Stores the rule and returns it with its new id.
    async fn create(&self, rule: &RuleConfig) -> Result<RuleConfig>;

    async fn by_id(&self, id: i64) -> Result<Option<RuleConfig>>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<RuleConfig>>;

    async fn enabled_for_user(&self, user_id: i64) -> Result<Vec<RuleConfig>>;

    /// Every enabled rule across all users.
    async fn list_enabled(&self) -> Result<Vec<RuleConfig>>;

    async fn update(&self, rule: &RuleConfig) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool>;
}

/// Cooldown gate and delivery log.
#[async_trait]
pub trait AlertHistoryRepository: Send + Sync {
    /// Records the alert unless one with the same (user, symbol, rule type)
    /// was reserved within `cooldown` of `alert.triggered_at`.
    ///
    /// The check and the insert are one statement, so concurrent callers
    /// cannot both win the same slot. Returns the new record id, or `None`
    /// when suppressed.
    async fn reserve(&self, alert: &NewAlert, cooldown: Duration) -> Result<Option<i64>>;

    async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Drops a reservation whose delivery failed on every channel.
    async fn release(&self, id: i64) -> Result<()>;

    /// Whether a delivered alert exists within `cooldown` before `now`.
    async fn has_recent_alert(
        &self,
        user_id: i64,
        symbol_id: i64,
        rule_type: &str,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Newest first.
    async fn history_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<AlertRecord>>;
}

/// Every repository behind one handle.
#[derive(Clone)]
pub struct Repositories {
    pub symbols: Arc<dyn SymbolRepository>,
    pub users: Arc<dyn UserRepository>,
    pub watchlist: Arc<dyn WatchlistRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub alerts: Arc<dyn AlertHistoryRepository>,
}

impl Repositories {
    pub fn sqlx(pool: SqlitePool) -> Self {
        Self {
            symbols: Arc::new(SqlxSymbolRepository::new(pool.clone())),
            users: Arc::new(SqlxUserRepository::new(pool.clone())),
            watchlist: Arc::new(SqlxWatchlistRepository::new(pool.clone())),
            rules: Arc::new(SqlxRuleRepository::new(pool.clone())),
            alerts: Arc::new(SqlxAlertHistoryRepository::new(pool)),
        }
    }
}
