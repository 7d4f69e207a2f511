//! User repository.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::{DbError, Result};

/// User record from database. Password hash never leaves this module
/// except through `verify_password`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

pub struct UserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user with a freshly hashed password.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<User> {
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| DbError::Sqlx(sqlx::Error::Protocol(format!("bcrypt: {e}"))))?;

        let id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(&hash)
        .bind(role)
        .bind(Utc::now())
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        self.by_id(id).await
    }

    pub async fn by_id(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id.to_string()))
    }

    pub async fn by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(self.pool)
                .await?,
        )
    }

    pub async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(email)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.is_some())
    }
}
