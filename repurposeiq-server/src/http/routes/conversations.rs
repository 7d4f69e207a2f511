//! Conversation management endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::conversations::{Conversation, ConversationRepo, Message};
use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// POST /api/conversations - start an empty conversation
async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateRequest>,
) -> Result<(axum::http::StatusCode, Json<Conversation>), ApiError> {
    let title = req.title.as_deref().unwrap_or("New conversation");
    let convo = ConversationRepo::new(&state.pool)
        .create(user.id, title)
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(convo)))
}

/// GET /api/conversations
async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    Ok(Json(ConversationRepo::new(&state.pool).list(user.id).await?))
}

/// GET /api/conversations/{id}/messages
async fn messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(
        ConversationRepo::new(&state.pool).messages(id, user.id).await?,
    ))
}

/// PUT /api/conversations/{id}
async fn rename(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title must not be empty"));
    }
    Ok(Json(
        ConversationRepo::new(&state.pool)
            .rename(id, user.id, title)
            .await?,
    ))
}

/// DELETE /api/conversations/{id}
async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    ConversationRepo::new(&state.pool).delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Conversation routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversations", get(list).post(create))
        .route("/conversations/{id}", axum::routing::put(rename).delete(delete))
        .route("/conversations/{id}/messages", get(messages))
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

    #[tokio::test]
    async fn rename_and_delete_round_trip() {
        let state = test_state().await;
        let convo = ConversationRepo::new(&state.pool)
            .create(1, "metformin repurposing options")
            .await
            .unwrap();

        let Json(renamed) = rename(
            State(state.clone()),
            owner(),
            Path(convo.id),
            Json(RenameRequest {
                title: "Metformin deep dive".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(renamed.title, "Metformin deep dive");

        let status = delete(State(state.clone()), owner(), Path(convo.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(remaining) = list(State(state), owner()).await.unwrap();
        assert!(remaining.is_empty());
    }
}
