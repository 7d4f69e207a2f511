//! Usage analytics over tracked queries.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::db::repos::tracking::{AnalyticsStats, TrackingRepo};
use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// GET /api/analytics/stats
async fn analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<AnalyticsStats>, ApiError> {
    // Query-level analytics are for admins and managers.
    if user.role != "admin" && user.role != "manager" {
        return Err(ApiError::Forbidden {
            reason: "analytics require a manager or admin account".into(),
        });
    }
    Ok(Json(TrackingRepo::new(&state.pool).stats().await?))
}

/// Analytics routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/analytics/stats", get(analytics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    #[tokio::test]
    async fn analysts_are_forbidden() {
        let state = test_state().await;
        let analyst = AuthUser {
            id: 2,
            username: "analyst".into(),
            role: "analyst".into(),
        };
        let err = analytics(State(state), analyst).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn admins_get_stats() {
        let state = test_state().await;
        let admin = AuthUser {
            id: 1,
            username: "admin".into(),
            role: "admin".into(),
        };
        let Json(stats) = analytics(State(state), admin).await.unwrap();
        assert_eq!(stats.total_queries, 0);
    }
}
