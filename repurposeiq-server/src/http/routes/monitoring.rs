//! Trial monitor control endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::monitor::MonitorStatus;

#[derive(Deserialize)]
pub struct TrackRequest {
    pub molecule: String,
}

/// GET /api/monitoring/status
async fn status(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Json<MonitorStatus> {
    Json(state.monitor.status().await)
}

/// POST /api/monitoring/start
async fn start(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<MonitorStatus>, ApiError> {
    require_admin(&user)?;
    state.monitor.start();
    Ok(Json(state.monitor.status().await))
}

/// POST /api/monitoring/stop
async fn stop(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<MonitorStatus>, ApiError> {
    require_admin(&user)?;
    state.monitor.stop();
    Ok(Json(state.monitor.status().await))
}

/// POST /api/monitoring/track
async fn track(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<TrackRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let molecule = req.molecule.trim();
    if molecule.is_empty() {
        return Err(ApiError::validation("molecule must not be empty"));
    }
    let added = state.monitor.track(molecule).await;
    Ok(Json(json!({"molecule": molecule.to_lowercase(), "added": added})))
}

/// POST /api/monitoring/untrack
async fn untrack(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<TrackRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.monitor.untrack(&req.molecule).await;
    Ok(Json(json!({"molecule": req.molecule.trim().to_lowercase(), "removed": removed})))
}

fn require_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.role == "admin" {
        Ok(())
    } else {
        Err(ApiError::Forbidden {
            reason: "monitor control requires an admin account".into(),
        })
    }
}

/// Monitoring routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/monitoring/status", get(status))
        .route("/monitoring/start", post(start))
        .route("/monitoring/stop", post(stop))
        .route("/monitoring/track", post(track))
        .route("/monitoring/untrack", post(untrack))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    fn analyst() -> AuthUser {
        AuthUser {
            id: 2,
            username: "analyst".into(),
            role: "analyst".into(),
        }
    }

    #[tokio::test]
    async fn start_requires_admin() {
        let state = test_state().await;
        let err = start(State(state), analyst()).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn track_untrack_updates_status() {
        let state = test_state().await;

        track(
            State(state.clone()),
            analyst(),
            Json(TrackRequest {
                molecule: "Semaglutide".into(),
            }),
        )
        .await
        .unwrap();

        let Json(current) = status(State(state.clone()), analyst()).await;
        assert!(current.tracked_molecules.contains(&"semaglutide".to_string()));

        untrack(
            State(state.clone()),
            analyst(),
            Json(TrackRequest {
                molecule: "semaglutide".into(),
            }),
        )
        .await
        .unwrap();
        let Json(after) = status(State(state), analyst()).await;
        assert!(!after.tracked_molecules.contains(&"semaglutide".to_string()));
    }
}
