//! Clinical trial alert repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::Result;

/// Cap on unviewed alerts returned in a single fetch.
const UNVIEWED_LIMIT: i64 = 50;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrialAlert {
    pub id: i64,
    pub nct_id: String,
    pub molecule: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub phase: Option<String>,
    pub start_date: Option<String>,
    pub url: Option<String>,
    pub alert_time: DateTime<Utc>,
    pub viewed: i64,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub nct_id: String,
    pub molecule: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub phase: Option<String>,
    pub start_date: Option<String>,
    pub url: Option<String>,
}

pub struct AlertRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an alert. Returns false when the (nct_id, molecule) pair
    /// was already seen.
    pub async fn insert(&self, alert: &NewAlert) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO clinical_trial_alerts \
             (nct_id, molecule, title, status, phase, start_date, url, alert_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.nct_id)
        .bind(&alert.molecule)
        .bind(&alert.title)
        .bind(&alert.status)
        .bind(&alert.phase)
        .bind(&alert.start_date)
        .bind(&alert.url)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unviewed(&self) -> Result<Vec<TrialAlert>> {
        Ok(sqlx::query_as::<_, TrialAlert>(
            "SELECT * FROM clinical_trial_alerts WHERE viewed = 0 \
             ORDER BY alert_time DESC LIMIT ?",
        )
        .bind(UNVIEWED_LIMIT)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn for_molecule(&self, molecule: &str) -> Result<Vec<TrialAlert>> {
        Ok(sqlx::query_as::<_, TrialAlert>(
            "SELECT * FROM clinical_trial_alerts WHERE molecule = ? COLLATE NOCASE \
             ORDER BY alert_time DESC",
        )
        .bind(molecule)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn mark_viewed(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE clinical_trial_alerts SET viewed = 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_all_viewed(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE clinical_trial_alerts SET viewed = 1 WHERE viewed = 0")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
