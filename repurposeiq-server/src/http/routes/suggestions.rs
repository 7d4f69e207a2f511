//! Query suggestion endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::suggestions::{Suggestion, SuggestionRepo};
use crate::http::error::ApiError;
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct SuggestionParams {
    pub category: Option<String>,
}

/// GET /api/suggestions?category=market - no auth, feeds the landing page
async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let repo = SuggestionRepo::new(&state.pool);
    let rows = match params.category.as_deref() {
        Some(category) => repo.by_category(category).await?,
        None => repo.all().await?,
    };
    Ok(Json(rows))
}

/// Suggestion routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/suggestions", get(suggestions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    #[tokio::test]
    async fn category_filter_applies() {
        let state = test_state().await;
        let Json(all) = suggestions(
            State(state.clone()),
            Query(SuggestionParams { category: None }),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 8);

        let Json(patent) = suggestions(
            State(state),
            Query(SuggestionParams {
                category: Some("patent".into()),
            }),
        )
        .await
        .unwrap();
        assert!(patent.iter().all(|s| s.category == "patent"));
    }
}
