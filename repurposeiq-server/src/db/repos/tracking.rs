//! Query tracking and analytics aggregation.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use super::Result;

/// Short words excluded from the top-terms histogram.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "what", "which", "with", "about", "from", "that", "this", "are", "how",
];

const TOP_TERMS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsStats {
    pub total_queries: i64,
    pub successful_queries: i64,
    pub failed_queries: i64,
    pub queries_today: i64,
    pub avg_response_time_ms: f64,
    pub agent_usage: HashMap<String, i64>,
    pub top_terms: Vec<TermCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: i64,
}

pub struct TrackingRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TrackingRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn stats(&self) -> Result<AnalyticsStats> {
        let totals = sqlx::query(
            "SELECT COUNT(*) AS total, \
                    COALESCE(SUM(success), 0) AS ok, \
                    COALESCE(AVG(response_time_ms), 0.0) AS avg_ms \
             FROM query_tracking",
        )
        .fetch_one(self.pool)
        .await?;
        let total: i64 = totals.get("total");
        let ok: i64 = totals.get("ok");
        let avg_ms: f64 = totals.get("avg_ms");

        let (today,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM query_tracking WHERE date(created_at) = date(?)",
        )
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query("SELECT query_text, agents_used FROM query_tracking")
            .fetch_all(self.pool)
            .await?;

        let mut agent_usage: HashMap<String, i64> = HashMap::new();
        let mut terms: HashMap<String, i64> = HashMap::new();
        for row in &rows {
            let agents: Option<String> = row.get("agents_used");
            if let Some(json) = agents {
                if let Ok(names) = serde_json::from_str::<Vec<String>>(&json) {
                    for name in names {
                        *agent_usage.entry(name).or_default() += 1;
                    }
                }
            }

            let query: String = row.get("query_text");
            for word in query.to_lowercase().split_whitespace() {
                let word = word.trim_matches(|c: char| !c.is_alphanumeric());
                if word.len() > 3 && !STOPWORDS.contains(&word) {
                    *terms.entry(word.to_string()).or_default() += 1;
                }
            }
        }

        let mut top_terms: Vec<TermCount> = terms
            .into_iter()
            .map(|(term, count)| TermCount { term, count })
            .collect();
        top_terms.sort_by(|a, b| b.count.cmp(&a.count).then(a.term.cmp(&b.term)));
        top_terms.truncate(TOP_TERMS);

        Ok(AnalyticsStats {
            total_queries: total,
            successful_queries: ok,
            failed_queries: total - ok,
            queries_today: today,
            avg_response_time_ms: avg_ms,
            agent_usage,
            top_terms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    async fn track(pool: &SqlitePool, query: &str, agents: &str, ms: i64, success: i64) {
        sqlx::query(
            "INSERT INTO query_tracking \
             (user_id, query_text, agents_used, response_time_ms, success, created_at) \
             VALUES (1, ?, ?, ?, ?, ?)",
        )
        .bind(query)
        .bind(agents)
        .bind(ms)
        .bind(success)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn stats_aggregate_agents_and_terms() {
        let pool = test_pool().await;
        track(&pool, "metformin market size", "[\"MARKET\",\"WEB\"]", 100, 1).await;
        track(&pool, "metformin patent expiry", "[\"PATENT\",\"WEB\"]", 300, 1).await;
        track(&pool, "what is the weather", "[]", 50, 0).await;

        let stats = TrackingRepo::new(&pool).stats().await.unwrap();
        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.successful_queries, 2);
        assert_eq!(stats.failed_queries, 1);
        assert_eq!(stats.queries_today, 3);
        assert_eq!(stats.agent_usage.get("WEB"), Some(&2));
        assert_eq!(stats.top_terms[0].term, "metformin");
        assert_eq!(stats.top_terms[0].count, 2);
        assert!((stats.avg_response_time_ms - 150.0).abs() < f64::EPSILON);
    }
}
