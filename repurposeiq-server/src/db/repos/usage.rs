//! Daily API usage counters backing the rate limiter.

use chrono::Utc;
use sqlx::SqlitePool;

use super::Result;

pub struct UsageRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UsageRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Calls made by one user against one API in the current UTC day.
    pub async fn user_count_today(&self, api_name: &str, user_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM api_usage \
             WHERE api_name = ? AND user_id = ? AND date = date(?)",
        )
        .bind(api_name)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Calls made by everyone against one API in the current UTC day.
    pub async fn global_count_today(&self, api_name: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM api_usage WHERE api_name = ? AND date = date(?)",
        )
        .bind(api_name)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    pub async fn record(&self, api_name: &str, user_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO api_usage (api_name, user_id, date) VALUES (?, ?, date(?))")
            .bind(api_name)
            .bind(user_id)
            .bind(Utc::now())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    #[tokio::test]
    async fn counts_are_per_user_and_global() {
        let pool = test_pool().await;
        let repo = UsageRepo::new(&pool);

        repo.record("groq", 1).await.unwrap();
        repo.record("groq", 1).await.unwrap();
        repo.record("groq", 2).await.unwrap();
        repo.record("tavily", 1).await.unwrap();

        assert_eq!(repo.user_count_today("groq", 1).await.unwrap(), 2);
        assert_eq!(repo.user_count_today("groq", 2).await.unwrap(), 1);
        assert_eq!(repo.global_count_today("groq").await.unwrap(), 3);
        assert_eq!(repo.global_count_today("tavily").await.unwrap(), 1);
    }
}
