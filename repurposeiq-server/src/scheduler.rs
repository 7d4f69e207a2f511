//! Background workflow scheduler.
//!
//! Ticks once a minute, runs due workflows, and computes the next
//! fire time from their cron expression.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{error, info, warn};

use crate::db::repos::workflows::{WorkflowRepo, WorkflowRow};
use crate::http::server::AppState;
use crate::models::{Workflow, WorkflowStep};

const TICK: Duration = Duration::from_secs(60);

/// Longest a single wait step is allowed to block a run.
const MAX_WAIT_SECONDS: u64 = 300;

/// Accept classic five-field cron by prepending a seconds column.
pub fn normalize_cron(expr: &str) -> String {
    let fields = expr.split_whitespace().count();
    if fields == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Next fire time strictly after `after`, or None for an invalid
/// expression.
pub fn next_run_after(expr: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = Schedule::from_str(&normalize_cron(expr)).ok()?;
    schedule.after(&after).next()
}

/// Spawn the scheduler loop.
pub fn spawn(state: Arc<AppState>) {
    tokio::spawn(async move {
        info!("workflow scheduler started");
        let mut ticker = tokio::time::interval(TICK);
        loop {
            ticker.tick().await;
            if let Err(e) = run_due(&state).await {
                error!("workflow scheduler tick failed: {}", e);
            }
        }
    });
}

async fn run_due(state: &Arc<AppState>) -> Result<(), crate::db::repos::DbError> {
    let now = Utc::now();
    let due = WorkflowRepo::new(&state.pool).due(now).await?;
    for row in due {
        execute(state, row).await?;
    }
    Ok(())
}

/// Execute one workflow run and record the outcome.
pub async fn execute(state: &Arc<AppState>, row: WorkflowRow) -> Result<(), crate::db::repos::DbError> {
    let repo = WorkflowRepo::new(&state.pool);
    repo.mark_running(&row.id).await?;

    let next = row
        .schedule
        .as_deref()
        .and_then(|expr| next_run_after(expr, Utc::now()));

    let workflow = match Workflow::try_from(row.clone()) {
        Ok(workflow) => workflow,
        Err(e) => {
            warn!(workflow = %row.id, "workflow has invalid steps: {}", e);
            repo.finish_run(&row.id, false, next).await?;
            return Ok(());
        }
    };

    info!(workflow = %workflow.id, name = %workflow.name, "running workflow");
    let succeeded = run_steps(state, &workflow.steps).await;
    repo.finish_run(&workflow.id, succeeded, next).await?;
    Ok(())
}

async fn run_steps(state: &Arc<AppState>, steps: &[WorkflowStep]) -> bool {
    let mut previous_output = String::new();
    let mut queue: Vec<&WorkflowStep> = steps.iter().collect();
    let mut index = 0;

    while index < queue.len() {
        let step = queue[index];
        index += 1;

        match step {
            WorkflowStep::Query { query } => {
                let result = state.master.answer(query, &[], None).await;
                if result.rejected {
                    return false;
                }
                previous_output = result.answer;
            }
            WorkflowStep::MarketAnalysis { molecule } => {
                match run_single_agent(state, repurposeiq_agents::router::AgentKind::Market, molecule).await {
                    Ok(output) => previous_output = output,
                    Err(_) => return false,
                }
            }
            WorkflowStep::PatentCheck { molecule } => {
                match run_single_agent(state, repurposeiq_agents::router::AgentKind::Patent, molecule).await {
                    Ok(output) => previous_output = output,
                    Err(_) => return false,
                }
            }
            WorkflowStep::ClinicalTrialSearch { drug } => {
                match run_single_agent(state, repurposeiq_agents::router::AgentKind::Clinical, drug).await {
                    Ok(output) => previous_output = output,
                    Err(_) => return false,
                }
            }
            WorkflowStep::Wait { seconds } => {
                tokio::time::sleep(Duration::from_secs((*seconds).min(MAX_WAIT_SECONDS))).await;
            }
            WorkflowStep::Condition { condition, then, otherwise } => {
                let branch = if condition.evaluate(&previous_output) {
                    then.as_deref()
                } else {
                    otherwise.as_deref()
                };
                if let Some(step) = branch {
                    queue.insert(index, step);
                }
            }
        }
    }
    true
}

async fn run_single_agent(
    state: &Arc<AppState>,
    kind: repurposeiq_agents::router::AgentKind,
    subject: &str,
) -> Result<String, repurposeiq_agents::AgentError> {
    repurposeiq_agents::run_agent(kind, subject, state.master.context()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use chrono::TimeZone;

    #[test]
    fn five_field_cron_is_normalized() {
        assert_eq!(normalize_cron("0 9 * * Mon"), "0 0 9 * * Mon");
        assert_eq!(normalize_cron("0 0 9 * * Mon"), "0 0 9 * * Mon");
    }

    #[test]
    fn next_run_is_computed() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let next = next_run_after("0 9 * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap());

        assert!(next_run_after("not a cron", after).is_none());
    }

    #[tokio::test]
    async fn due_workflow_runs_and_reschedules() {
        let state = test_state().await;
        let repo = WorkflowRepo::new(&state.pool);
        let steps = r#"[{"type":"market_analysis","molecule":"metformin"}]"#;
        let row = repo
            .create(1, "hourly scan", None, steps, Some("0 * * * *"),
                    Some(Utc::now() - chrono::Duration::minutes(1)))
            .await
            .unwrap();

        run_due(&state).await.unwrap();

        let after = repo.by_id(&row.id, 1).await.unwrap();
        assert_eq!(after.status, "completed");
        assert_eq!(after.run_count, 1);
        assert!(after.next_run.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn condition_branches_on_previous_output() {
        let state = test_state().await;
        let steps: Vec<WorkflowStep> = serde_json::from_str(
            r#"[
                {"type":"market_analysis","molecule":"metformin"},
                {"type":"condition",
                 "condition":{"operator":"contains","value":"metformin"},
                 "then":{"type":"patent_check","molecule":"metformin"}}
            ]"#,
        )
        .unwrap();
        assert!(run_steps(&state, &steps).await);
    }
}
