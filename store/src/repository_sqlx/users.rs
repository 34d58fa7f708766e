use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{map_rows, ms_to_utc};
use crate::model::{NewUser, User};
use crate::repository::UserRepository;

pub struct SqlxUserRepository {
    pool: SqlitePool,
}

impl SqlxUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> anyhow::Result<User> {
        let now = common::time::now_ms();
        let id = sqlx::query(
            r#"INSERT INTO users (email, discord_webhook_url, created_at_ms) VALUES (?, ?, ?);"#,
        )
        .bind(&user.email)
        .bind(&user.discord_webhook_url)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(User {
            id,
            email: user.email.clone(),
            discord_webhook_url: user.discord_webhook_url.clone(),
            created_at: ms_to_utc(now)?,
        })
    }

    async fn by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(r#"SELECT * FROM users WHERE id = ?;"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET email = ?, discord_webhook_url = ? WHERE id = ?;"#)
            .bind(&user.email)
            .bind(&user.discord_webhook_url)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = ?;"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query(r#"SELECT * FROM users ORDER BY id;"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(map_rows(rows, "users", row_to_user))
    }
}

fn row_to_user(r: &SqliteRow) -> anyhow::Result<User> {
    Ok(User {
        id: r.try_get("id")?,
        email: r.try_get("email")?,
        discord_webhook_url: r.try_get("discord_webhook_url")?,
        created_at: ms_to_utc(r.try_get("created_at_ms")?)?,
    })
}
