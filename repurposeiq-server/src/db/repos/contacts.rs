//! Contact form submissions.

use chrono::Utc;
use sqlx::SqlitePool;

use super::Result;

pub struct ContactRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ContactRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, name: &str, email: &str, message: &str) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO contact_submissions (name, email, message, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(email)
        .bind(message)
        .bind(Utc::now())
        .execute(self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }
}
