//! Dashboard endpoint feeding the KPI tiles and data tables.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::repos::dashboard::{
    DashboardKpis, DashboardRepo, MarketSummary, PatentSummary, TrialSummary,
};
use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct DashboardResponse {
    pub kpis: DashboardKpis,
    pub markets: Vec<MarketSummary>,
    pub patents: Vec<PatentSummary>,
    pub trials: Vec<TrialSummary>,
}

/// GET /api/dashboard
async fn dashboard(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let repo = DashboardRepo::new(&state.pool);
    Ok(Json(DashboardResponse {
        kpis: repo.kpis().await?,
        markets: repo.markets().await?,
        patents: repo.patents().await?,
        trials: repo.trials().await?,
    }))
}

/// Dashboard routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    #[tokio::test]
    async fn dashboard_returns_seeded_rows() {
        let state = test_state().await;
        let user = AuthUser {
            id: 1,
            username: "admin".into(),
            role: "admin".into(),
        };

        let Json(body) = dashboard(State(state), user).await.unwrap();
        assert_eq!(body.markets.len(), 8);
        assert_eq!(body.patents.len(), 5);
        assert_eq!(body.trials.len(), 6);
        assert!(body.kpis.total_market_usd_mn > 0.0);
    }
}
