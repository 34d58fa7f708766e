use sqlx::SqlitePool;

/// Idempotent schema setup. Timestamps are Unix milliseconds.
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Symbols
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS symbols (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  ticker TEXT NOT NULL UNIQUE,
  name TEXT NOT NULL,
  kind TEXT NOT NULL,
  exchange TEXT NOT NULL,
  updated_at_ms INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Users
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  email TEXT,
  discord_webhook_url TEXT,
  created_at_ms INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Watchlist
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS user_watchlist (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
  created_at_ms INTEGER NOT NULL,
  UNIQUE (user_id, symbol_id)
);
"#,
    )
    .execute(pool)
    .await?;

    // Rules
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS user_rules (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  rule_type TEXT NOT NULL,
  parameters TEXT NOT NULL,
  enabled INTEGER NOT NULL DEFAULT 1 CHECK (enabled IN (0,1)),
  symbol_id INTEGER REFERENCES symbols(id) ON DELETE CASCADE
);
"#,
    )
    .execute(pool)
    .await?;

    // Alert history
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS alert_history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
  rule_type TEXT NOT NULL,
  message TEXT NOT NULL,
  triggered_at_ms INTEGER NOT NULL,
  notified_at_ms INTEGER
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_watchlist_user ON user_watchlist(user_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_rules_user ON user_rules(user_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_alert_history_key ON alert_history(user_id, symbol_id, rule_type);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
