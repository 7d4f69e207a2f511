//! Stored sentiment analysis snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::Result;

const HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SentimentRow {
    pub id: i64,
    pub molecule: String,
    pub source: String,
    pub content: Option<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<String>,
    /// JSON array of extracted keywords.
    pub keywords: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct SentimentRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SentimentRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        molecule: &str,
        source: &str,
        content: &str,
        score: f64,
        label: &str,
        keywords_json: &str,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO sentiment_analysis \
             (molecule, source, content, sentiment_score, sentiment_label, keywords, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(molecule)
        .bind(source)
        .bind(content)
        .bind(score)
        .bind(label)
        .bind(keywords_json)
        .bind(Utc::now())
        .execute(self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn history(&self, molecule: &str) -> Result<Vec<SentimentRow>> {
        Ok(sqlx::query_as::<_, SentimentRow>(
            "SELECT * FROM sentiment_analysis WHERE molecule = ? COLLATE NOCASE \
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(molecule)
        .bind(HISTORY_LIMIT)
        .fetch_all(self.pool)
        .await?)
    }
}
