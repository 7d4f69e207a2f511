//! Contact form endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::repos::contacts::ContactRepo;
use crate::http::error::ApiError;
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// POST /api/contact - unauthenticated
async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = req.name.trim();
    let email = req.email.trim();
    let message = req.message.trim();
    if name.is_empty() || message.is_empty() {
        return Err(ApiError::validation("name and message are required"));
    }
    if !email.contains('@') {
        return Err(ApiError::validation("email is not valid"));
    }

    let id = ContactRepo::new(&state.pool).insert(name, email, message).await?;
    Ok((StatusCode::CREATED, Json(json!({"id": id}))))
}

/// Contact routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/contact", post(submit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    #[tokio::test]
    async fn submission_is_stored() {
        let state = test_state().await;
        let (status, _) = submit(
            State(state.clone()),
            Json(ContactRequest {
                name: "Dana".into(),
                email: "dana@pharma.com".into(),
                message: "Interested in a demo".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contact_submissions")
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn bad_email_is_rejected() {
        let state = test_state().await;
        let err = submit(
            State(state),
            Json(ContactRequest {
                name: "Dana".into(),
                email: "not-an-email".into(),
                message: "hi".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }
}
