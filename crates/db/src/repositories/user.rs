use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use quotedesk_core::domain::user::{NewUser, User, UserId, UserRole};

use super::{parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Registration inserts users inactive; the only path that flips
    /// `is_active` is the approval of the customer they requested.
    pub async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (login_id, display_name, role, is_active, created_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&new_user.login_id)
        .bind(&new_user.display_name)
        .bind(new_user.role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = UserId(result.last_insert_rowid());
        self.find_by_id(&id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("user {id} vanished after insert")))
    }

    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, login_id, display_name, role, is_active, created_at
             FROM users WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    pub async fn find_by_login(&self, login_id: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, login_id, display_name, role, is_active, created_at
             FROM users WHERE login_id = ?",
        )
        .bind(login_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role_raw: String = row.try_get("role")?;
    let role = UserRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown user role `{role_raw}`")))?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        login_id: row.try_get("login_id")?,
        display_name: row.try_get("display_name")?,
        role,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
