use anyhow::Context;
use async_trait::async_trait;
use engine::RuleConfig;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::map_rows;
use crate::repository::RuleRepository;

pub struct SqlxRuleRepository {
    pool: SqlitePool,
}

impl SqlxRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for SqlxRuleRepository {
    async fn create(&self, rule: &RuleConfig) -> anyhow::Result<RuleConfig> {
        let params = serde_json::to_string(&rule.parameters)?;

        let id = sqlx::query(
            r#"
INSERT INTO user_rules (user_id, rule_type, parameters, enabled, symbol_id)
VALUES (?, ?, ?, ?, ?);
"#,
        )
        .bind(rule.user_id)
        .bind(&rule.rule_type)
        .bind(params)
        .bind(rule.enabled as i64)
        .bind(rule.symbol_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert {} rule", rule.rule_type))?
        .last_insert_rowid();

        Ok(RuleConfig {
            id: Some(id),
            ..rule.clone()
        })
    }

    async fn by_id(&self, id: i64) -> anyhow::Result<Option<RuleConfig>> {
        let row = sqlx::query(r#"SELECT * FROM user_rules WHERE id = ?;"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_rule).transpose()
    }

    async fn list_for_user(&self, user_id: i64) -> anyhow::Result<Vec<RuleConfig>> {
        let rows = sqlx::query(r#"SELECT * FROM user_rules WHERE user_id = ? ORDER BY id;"#)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(map_rows(rows, "user_rules", row_to_rule))
    }

    async fn enabled_for_user(&self, user_id: i64) -> anyhow::Result<Vec<RuleConfig>> {
        let rows = sqlx::query(
            r#"SELECT * FROM user_rules WHERE user_id = ? AND enabled = 1 ORDER BY id;"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(map_rows(rows, "user_rules", row_to_rule))
    }

    async fn list_enabled(&self) -> anyhow::Result<Vec<RuleConfig>> {
        let rows = sqlx::query(r#"SELECT * FROM user_rules WHERE enabled = 1 ORDER BY id;"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(map_rows(rows, "user_rules", row_to_rule))
    }

    async fn update(&self, rule: &RuleConfig) -> anyhow::Result<()> {
        let id = rule.id.context("cannot update a rule without an id")?;
        let params = serde_json::to_string(&rule.parameters)?;

        sqlx::query(
            r#"
UPDATE user_rules
SET rule_type = ?, parameters = ?, enabled = ?, symbol_id = ?
WHERE id = ?;
"#,
        )
        .bind(&rule.rule_type)
        .bind(params)
        .bind(rule.enabled as i64)
        .bind(rule.symbol_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM user_rules WHERE id = ?;"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"UPDATE user_rules SET enabled = ? WHERE id = ?;"#)
            .bind(enabled as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

fn row_to_rule(r: &SqliteRow) -> anyhow::Result<RuleConfig> {
    let params: String = r.try_get("parameters")?;
    let parameters = serde_json::from_str(&params)
        .with_context(|| format!("invalid rule parameters JSON '{params}'"))?;
    let enabled: i64 = r.try_get("enabled")?;

    Ok(RuleConfig {
        id: Some(r.try_get("id")?),
        user_id: r.try_get("user_id")?,
        rule_type: r.try_get("rule_type")?,
        parameters,
        enabled: enabled == 1,
        symbol_id: r.try_get("symbol_id")?,
    })
}
