//! Workflow CRUD and manual execution.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::repos::workflows::WorkflowRepo;
use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{Workflow, WorkflowStep};
use crate::scheduler;

#[derive(Deserialize)]
pub struct WorkflowRequest {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    pub schedule: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn validate(req: &WorkflowRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("workflow name must not be empty"));
    }
    if req.steps.is_empty() {
        return Err(ApiError::validation("workflow needs at least one step"));
    }
    if let Some(expr) = req.schedule.as_deref() {
        if scheduler::next_run_after(expr, Utc::now()).is_none() {
            return Err(ApiError::validation(format!("invalid cron expression: {expr}")));
        }
    }
    Ok(())
}

fn to_workflow(row: crate::db::repos::workflows::WorkflowRow) -> Result<Workflow, ApiError> {
    Workflow::try_from(row).map_err(|e| ApiError::internal(format!("stored steps unreadable: {e}")))
}

/// POST /api/workflows
async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<WorkflowRequest>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    validate(&req)?;
    let steps_json = serde_json::to_string(&req.steps)?;
    let next_run = req
        .schedule
        .as_deref()
        .and_then(|expr| scheduler::next_run_after(expr, Utc::now()));

    let row = WorkflowRepo::new(&state.pool)
        .create(
            user.id,
            req.name.trim(),
            req.description.as_deref(),
            &steps_json,
            req.schedule.as_deref(),
            next_run,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(to_workflow(row)?)))
}

/// GET /api/workflows
async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    let rows = WorkflowRepo::new(&state.pool).list(user.id).await?;
    let workflows = rows.into_iter().map(to_workflow).collect::<Result<_, _>>()?;
    Ok(Json(workflows))
}

/// GET /api/workflows/{id}
async fn get_one(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let row = WorkflowRepo::new(&state.pool).by_id(&id, user.id).await?;
    Ok(Json(to_workflow(row)?))
}

/// PUT /api/workflows/{id}
async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<WorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    validate(&req)?;
    let steps_json = serde_json::to_string(&req.steps)?;
    let next_run = if req.enabled {
        req.schedule
            .as_deref()
            .and_then(|expr| scheduler::next_run_after(expr, Utc::now()))
    } else {
        None
    };

    let row = WorkflowRepo::new(&state.pool)
        .update(
            &id,
            user.id,
            req.name.trim(),
            req.description.as_deref(),
            &steps_json,
            req.schedule.as_deref(),
            req.enabled,
            next_run,
        )
        .await?;
    Ok(Json(to_workflow(row)?))
}

/// DELETE /api/workflows/{id}
async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    WorkflowRepo::new(&state.pool).delete(&id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/workflows/{id}/execute - run immediately
async fn execute(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let row = WorkflowRepo::new(&state.pool).by_id(&id, user.id).await?;
    scheduler::execute(&state, row).await?;
    let after = WorkflowRepo::new(&state.pool).by_id(&id, user.id).await?;
    Ok(Json(to_workflow(after)?))
}

/// Workflow routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workflows", get(list).post(create))
        .route(
            "/workflows/{id}",
            get(get_one).put(update).delete(delete),
        )
        .route("/workflows/{id}/execute", post(execute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    fn owner() -> AuthUser {
        AuthUser {
            id: 1,
            username: "admin".into(),
            role: "admin".into(),
        }
    }

    fn request(schedule: Option<&str>) -> WorkflowRequest {
        WorkflowRequest {
            name: "weekly metformin scan".into(),
            description: Some("market plus patents".into()),
            steps: serde_json::from_str(
                r#"[{"type":"market_analysis","molecule":"metformin"}]"#,
            )
            .unwrap(),
            schedule: schedule.map(String::from),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn invalid_cron_is_rejected() {
        let state = test_state().await;
        let err = create(State(state), owner(), Json(request(Some("every tuesday"))))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[tokio::test]
    async fn create_computes_next_run_and_execute_runs() {
        let state = test_state().await;
        let (status, Json(wf)) = create(
            State(state.clone()),
            owner(),
            Json(request(Some("0 9 * * Mon"))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(wf.next_run.is_some());
        assert_eq!(wf.status, "idle");

        let Json(after) = execute(State(state), owner(), Path(wf.id))
            .await
            .unwrap();
        assert_eq!(after.status, "completed");
        assert_eq!(after.run_count, 1);
    }
}
