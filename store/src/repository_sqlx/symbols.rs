use anyhow::{Context, anyhow};
use async_trait::async_trait;
use market::{ListedSymbol, SymbolKind};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{map_rows, ms_to_utc};
use crate::model::Symbol;
use crate::repository::SymbolRepository;

const UPSERT: &str = r#"
INSERT INTO symbols (ticker, name, kind, exchange, updated_at_ms)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT(ticker) DO UPDATE SET
  name = excluded.name,
  kind = excluded.kind,
  exchange = excluded.exchange,
  updated_at_ms = excluded.updated_at_ms;
"#;

pub struct SqlxSymbolRepository {
    pool: SqlitePool,
}

impl SqlxSymbolRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_many(&self, sql: &str, bind: Option<String>) -> anyhow::Result<Vec<Symbol>> {
        let mut q = sqlx::query(sql);
        if let Some(b) = bind {
            q = q.bind(b.clone()).bind(b);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(map_rows(rows, "symbols", row_to_symbol))
    }
}

#[async_trait]
impl SymbolRepository for SqlxSymbolRepository {
    async fn create(&self, symbol: &ListedSymbol) -> anyhow::Result<Symbol> {
        let now = common::time::now_ms();
        let id = sqlx::query(
            r#"INSERT INTO symbols (ticker, name, kind, exchange, updated_at_ms) VALUES (?, ?, ?, ?, ?);"#,
        )
        .bind(&symbol.ticker)
        .bind(&symbol.name)
        .bind(symbol.kind.to_string())
        .bind(&symbol.exchange)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert symbol {}", symbol.ticker))?
        .last_insert_rowid();

        Ok(Symbol {
            id,
            ticker: symbol.ticker.clone(),
            name: symbol.name.clone(),
            kind: symbol.kind,
            exchange: symbol.exchange.clone(),
            updated_at: ms_to_utc(now)?,
        })
    }

    async fn by_ticker(&self, ticker: &str) -> anyhow::Result<Option<Symbol>> {
        let row = sqlx::query(r#"SELECT * FROM symbols WHERE ticker = ?;"#)
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_symbol).transpose()
    }

    async fn by_id(&self, id: i64) -> anyhow::Result<Option<Symbol>> {
        let row = sqlx::query(r#"SELECT * FROM symbols WHERE id = ?;"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_symbol).transpose()
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Symbol>> {
        self.fetch_many(r#"SELECT * FROM symbols ORDER BY ticker;"#, None)
            .await
    }

    async fn list_by_kind(&self, kind: SymbolKind) -> anyhow::Result<Vec<Symbol>> {
        let rows = sqlx::query(r#"SELECT * FROM symbols WHERE kind = ? ORDER BY ticker;"#)
            .bind(kind.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(map_rows(rows, "symbols", row_to_symbol))
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<Symbol>> {
        let pattern = format!("%{query}%");
        self.fetch_many(
            r#"SELECT * FROM symbols WHERE ticker LIKE ? OR name LIKE ? ORDER BY ticker;"#,
            Some(pattern),
        )
        .await
    }

    async fn upsert(&self, symbol: &ListedSymbol) -> anyhow::Result<Symbol> {
        sqlx::query(UPSERT)
            .bind(&symbol.ticker)
            .bind(&symbol.name)
            .bind(symbol.kind.to_string())
            .bind(&symbol.exchange)
            .bind(common::time::now_ms())
            .execute(&self.pool)
            .await?;

        self.by_ticker(&symbol.ticker)
            .await?
            .ok_or_else(|| anyhow!("symbol {} vanished after upsert", symbol.ticker))
    }

    async fn bulk_upsert(&self, symbols: &[ListedSymbol]) -> anyhow::Result<usize> {
        let now = common::time::now_ms();
        let mut tx = self.pool.begin().await?;

        for s in symbols {
            sqlx::query(UPSERT)
                .bind(&s.ticker)
                .bind(&s.name)
                .bind(s.kind.to_string())
                .bind(&s.exchange)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(symbols.len())
    }
}

pub(crate) fn row_to_symbol(r: &SqliteRow) -> anyhow::Result<Symbol> {
    let kind_str: String = r.try_get("kind")?;
    let kind = kind_str
        .parse::<SymbolKind>()
        .map_err(|e| anyhow!(e))?;

    Ok(Symbol {
        id: r.try_get("id")?,
        ticker: r.try_get("ticker")?,
        name: r.try_get("name")?,
        kind,
        exchange: r.try_get("exchange")?,
        updated_at: ms_to_utc(r.try_get("updated_at_ms")?)?,
    })
}
