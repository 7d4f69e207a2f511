//! Registration, login, and token verification.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::repos::users::UserRepo;
use crate::http::auth::{issue_token, AuthUser};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::UserPublic;

const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserPublic,
}

/// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() || email.is_empty() {
        return Err(ApiError::validation("username and email are required"));
    }
    if !email.contains('@') {
        return Err(ApiError::validation("email is not valid"));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::validation("password must be at least 6 characters"));
    }

    let repo = UserRepo::new(&state.pool);
    if repo.username_or_email_taken(username, email).await? {
        return Err(ApiError::validation("username or email already in use"));
    }

    // New accounts always start as analysts.
    let user = repo.create(username, email, &req.password, "analyst").await?;
    let token = issue_token(&state.settings.jwt_secret, user.id, &user.username, &user.role)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let repo = UserRepo::new(&state.pool);

    // Same message for unknown user and wrong password.
    let user = repo
        .by_username(req.username.trim())
        .await?
        .filter(|u| u.verify_password(&req.password))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let token = issue_token(&state.settings.jwt_secret, user.id, &user.username, &user.role)?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// GET /api/auth/verify - echo the caller from a valid token
async fn verify(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<UserPublic>, ApiError> {
    let user = UserRepo::new(&state.pool).by_id(user.id).await?;
    Ok(Json(user.into()))
}

/// Auth routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", get(verify))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    #[tokio::test]
    async fn login_succeeds_for_seeded_analyst() {
        let state = test_state().await;
        let Json(body) = login(
            State(state),
            Json(LoginRequest {
                username: "analyst".into(),
                password: "analyst123".into(),
            }),
        )
        .await
        .unwrap();

        assert!(!body.token.is_empty());
        assert_eq!(body.user.username, "analyst");
        assert_eq!(body.user.role, "analyst");
    }

    #[tokio::test]
    async fn login_failure_is_uniform() {
        let state = test_state().await;

        let wrong_password = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "analyst".into(),
                password: "nope".into(),
            }),
        )
        .await
        .unwrap_err();
        let unknown_user = login(
            State(state),
            Json(LoginRequest {
                username: "ghost".into(),
                password: "nope".into(),
            }),
        )
        .await
        .unwrap_err();

        for err in [wrong_password, unknown_user] {
            match err {
                ApiError::Unauthorized { message } => assert_eq!(message, "Invalid credentials"),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn register_validates_and_issues_token() {
        let state = test_state().await;

        let short = register(
            State(state.clone()),
            Json(RegisterRequest {
                username: "newbie".into(),
                email: "newbie@x.com".into(),
                password: "abc".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(short, ApiError::Validation { .. }));

        let (status, Json(body)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                username: "newbie".into(),
                email: "newbie@x.com".into(),
                password: "secret1".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.user.role, "analyst");

        let duplicate = register(
            State(state),
            Json(RegisterRequest {
                username: "newbie".into(),
                email: "other@x.com".into(),
                password: "secret1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(duplicate, ApiError::Validation { .. }));
    }
}
