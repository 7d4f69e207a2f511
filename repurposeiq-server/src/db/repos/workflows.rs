//! Workflow repository.
//!
//! Workflow ids are client-visible UUID strings. All mutations are
//! scoped to the owning user.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::{DbError, Result};

#[derive(Debug, Clone, FromRow)]
pub struct WorkflowRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// JSON array of workflow steps.
    pub steps: String,
    /// Cron expression, five or six fields.
    pub schedule: Option<String>,
    pub enabled: i64,
    pub user_id: i64,
    pub status: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: i64,
    pub created_at: DateTime<Utc>,
}

pub struct WorkflowRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WorkflowRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        description: Option<&str>,
        steps_json: &str,
        schedule: Option<&str>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<WorkflowRow> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO workflows \
             (id, name, description, steps, schedule, enabled, user_id, status, next_run, created_at) \
             VALUES (?, ?, ?, ?, ?, 1, ?, 'idle', ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(steps_json)
        .bind(schedule)
        .bind(user_id)
        .bind(next_run)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        self.by_id(&id, user_id).await
    }

    pub async fn by_id(&self, id: &str, user_id: i64) -> Result<WorkflowRow> {
        sqlx::query_as::<_, WorkflowRow>("SELECT * FROM workflows WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("workflow", id))
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<WorkflowRow>> {
        Ok(sqlx::query_as::<_, WorkflowRow>(
            "SELECT * FROM workflows WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn update(
        &self,
        id: &str,
        user_id: i64,
        name: &str,
        description: Option<&str>,
        steps_json: &str,
        schedule: Option<&str>,
        enabled: bool,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<WorkflowRow> {
        let result = sqlx::query(
            "UPDATE workflows SET name = ?, description = ?, steps = ?, schedule = ?, \
             enabled = ?, next_run = ? WHERE id = ? AND user_id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(steps_json)
        .bind(schedule)
        .bind(enabled as i64)
        .bind(next_run)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("workflow", id));
        }
        self.by_id(id, user_id).await
    }

    pub async fn delete(&self, id: &str, user_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("workflow", id));
        }
        Ok(())
    }

    /// Enabled scheduled workflows due at or before `now`.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<WorkflowRow>> {
        Ok(sqlx::query_as::<_, WorkflowRow>(
            "SELECT * FROM workflows \
             WHERE enabled = 1 AND schedule IS NOT NULL \
               AND next_run IS NOT NULL AND next_run <= ?",
        )
        .bind(now)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn mark_running(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE workflows SET status = 'running' WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Record a finished run and schedule the next one.
    pub async fn finish_run(
        &self,
        id: &str,
        succeeded: bool,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE workflows SET status = ?, last_run = ?, next_run = ?, \
             run_count = run_count + 1 WHERE id = ?",
        )
        .bind(if succeeded { "completed" } else { "failed" })
        .bind(Utc::now())
        .bind(next_run)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;
    use chrono::Duration;

    const STEPS: &str = r#"[{"type":"query","query":"metformin market size"}]"#;

    #[tokio::test]
    async fn crud_is_owner_scoped() {
        let pool = test_pool().await;
        let repo = WorkflowRepo::new(&pool);

        let wf = repo
            .create(1, "weekly scan", None, STEPS, Some("0 0 9 * * Mon"), None)
            .await
            .unwrap();
        assert_eq!(wf.status, "idle");
        assert_eq!(wf.run_count, 0);

        // Wrong owner cannot see, update, or delete it.
        assert!(repo.by_id(&wf.id, 2).await.is_err());
        assert!(repo.delete(&wf.id, 2).await.is_err());
        assert!(repo
            .update(&wf.id, 2, "x", None, STEPS, None, true, None)
            .await
            .is_err());

        let renamed = repo
            .update(&wf.id, 1, "daily scan", Some("runs daily"), STEPS, None, false, None)
            .await
            .unwrap();
        assert_eq!(renamed.name, "daily scan");
        assert_eq!(renamed.enabled, 0);

        repo.delete(&wf.id, 1).await.unwrap();
        assert!(repo.list(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn due_and_run_bookkeeping() {
        let pool = test_pool().await;
        let repo = WorkflowRepo::new(&pool);
        let now = Utc::now();

        let overdue = repo
            .create(1, "overdue", None, STEPS, Some("0 * * * * *"), Some(now - Duration::minutes(5)))
            .await
            .unwrap();
        repo.create(1, "future", None, STEPS, Some("0 * * * * *"), Some(now + Duration::hours(1)))
            .await
            .unwrap();

        let due = repo.due(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, overdue.id);

        repo.mark_running(&overdue.id).await.unwrap();
        repo.finish_run(&overdue.id, true, Some(now + Duration::minutes(1)))
            .await
            .unwrap();

        let after = repo.by_id(&overdue.id, 1).await.unwrap();
        assert_eq!(after.status, "completed");
        assert_eq!(after.run_count, 1);
        assert!(after.last_run.is_some());
        assert!(repo.due(now).await.unwrap().is_empty());
    }
}
