use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{duration_ms, map_rows, ms_to_utc};
use crate::model::{AlertRecord, NewAlert};
use crate::repository::AlertHistoryRepository;

pub struct SqlxAlertHistoryRepository {
    pool: SqlitePool,
}

impl SqlxAlertHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertHistoryRepository for SqlxAlertHistoryRepository {
    async fn reserve(&self, alert: &NewAlert, cooldown: Duration) -> anyhow::Result<Option<i64>> {
        let at = alert.triggered_at.timestamp_millis();
        let cutoff = at.saturating_sub(duration_ms(cooldown));

        let res = sqlx::query(
            r#"
INSERT INTO alert_history (user_id, symbol_id, rule_type, message, triggered_at_ms)
SELECT ?, ?, ?, ?, ?
WHERE NOT EXISTS (
  SELECT 1 FROM alert_history
  WHERE user_id = ? AND symbol_id = ? AND rule_type = ?
    AND triggered_at_ms > ?
);
"#,
        )
        .bind(alert.user_id)
        .bind(alert.symbol_id)
        .bind(&alert.rule_type)
        .bind(&alert.message)
        .bind(at)
        .bind(alert.user_id)
        .bind(alert.symbol_id)
        .bind(&alert.rule_type)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 1 {
            Ok(Some(res.last_insert_rowid()))
        } else {
            Ok(None)
        }
    }

    async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE alert_history SET notified_at_ms = ? WHERE id = ?;"#)
            .bind(at.timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn release(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM alert_history WHERE id = ? AND notified_at_ms IS NULL;"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn has_recent_alert(
        &self,
        user_id: i64,
        symbol_id: i64,
        rule_type: &str,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let cutoff = now.timestamp_millis().saturating_sub(duration_ms(cooldown));

        let row = sqlx::query(
            r#"
SELECT 1 FROM alert_history
WHERE user_id = ? AND symbol_id = ? AND rule_type = ?
  AND notified_at_ms IS NOT NULL
  AND notified_at_ms > ?
LIMIT 1;
"#,
        )
        .bind(user_id)
        .bind(symbol_id)
        .bind(rule_type)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn history_for_user(&self, user_id: i64, limit: u32) -> anyhow::Result<Vec<AlertRecord>> {
        let rows = sqlx::query(
            r#"
SELECT * FROM alert_history
WHERE user_id = ?
ORDER BY triggered_at_ms DESC, id DESC
LIMIT ?;
"#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(map_rows(rows, "alert_history", row_to_alert))
    }
}

fn row_to_alert(r: &SqliteRow) -> anyhow::Result<AlertRecord> {
    let notified: Option<i64> = r.try_get("notified_at_ms")?;

    Ok(AlertRecord {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        symbol_id: r.try_get("symbol_id")?,
        rule_type: r.try_get("rule_type")?,
        message: r.try_get("message")?,
        triggered_at: ms_to_utc(r.try_get("triggered_at_ms")?)?,
        notified_at: notified.map(ms_to_utc).transpose()?,
    })
}
