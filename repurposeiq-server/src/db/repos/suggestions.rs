//! Canned query suggestions shown on the landing screen.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::Result;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Suggestion {
    pub id: i64,
    pub category: String,
    pub suggestion: String,
}

pub struct SuggestionRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SuggestionRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> Result<Vec<Suggestion>> {
        Ok(sqlx::query_as::<_, Suggestion>(
            "SELECT * FROM query_suggestions ORDER BY category, id",
        )
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn by_category(&self, category: &str) -> Result<Vec<Suggestion>> {
        Ok(sqlx::query_as::<_, Suggestion>(
            "SELECT * FROM query_suggestions WHERE category = ? ORDER BY id",
        )
        .bind(category)
        .fetch_all(self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    #[tokio::test]
    async fn seeded_suggestions_are_grouped() {
        let pool = test_pool().await;
        let repo = SuggestionRepo::new(&pool);

        assert_eq!(repo.all().await.unwrap().len(), 8);
        let market = repo.by_category("market").await.unwrap();
        assert_eq!(market.len(), 2);
        assert!(market[0].suggestion.contains("metformin"));
    }
}
