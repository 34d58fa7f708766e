use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::map_rows;
use super::symbols::row_to_symbol;
use crate::model::Symbol;
use crate::repository::WatchlistRepository;

pub struct SqlxWatchlistRepository {
    pool: SqlitePool,
}

impl SqlxWatchlistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatchlistRepository for SqlxWatchlistRepository {
    async fn add(&self, user_id: i64, symbol_id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
INSERT INTO user_watchlist (user_id, symbol_id, created_at_ms)
VALUES (?, ?, ?)
ON CONFLICT(user_id, symbol_id) DO NOTHING;
"#,
        )
        .bind(user_id)
        .bind(symbol_id)
        .bind(common::time::now_ms())
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn remove(&self, user_id: i64, symbol_id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM user_watchlist WHERE user_id = ? AND symbol_id = ?;"#)
            .bind(user_id)
            .bind(symbol_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Symbol>> {
        let rows = sqlx::query(
            r#"
SELECT s.* FROM symbols s
JOIN user_watchlist w ON s.id = w.symbol_id
WHERE w.user_id = ?
ORDER BY s.ticker;
"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(map_rows(rows, "symbols", row_to_symbol))
    }

    async fn contains(&self, user_id: i64, symbol_id: i64) -> anyhow::Result<bool> {
        let row = sqlx::query(r#"SELECT 1 FROM user_watchlist WHERE user_id = ? AND symbol_id = ?;"#)
            .bind(user_id)
            .bind(symbol_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn all_tickers(&self) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
SELECT DISTINCT s.ticker AS ticker FROM symbols s
JOIN user_watchlist w ON s.id = w.symbol_id
ORDER BY s.ticker;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(map_rows(rows, "user_watchlist", |r| Ok(r.try_get("ticker")?)))
    }
}
