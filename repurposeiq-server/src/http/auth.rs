//! JWT issuing, verification, and the `AuthUser` extractor.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::server::AppState;

/// Tokens are valid for one week.
const TOKEN_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub username: String,
    pub role: String,
    pub exp: usize,
}

pub fn issue_token(secret: &str, user_id: i64, username: &str, role: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::days(TOKEN_DAYS)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("token encoding failed: {e}")))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("invalid or expired token"))
}

/// Authenticated caller, extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected Bearer token"))?;

        let claims = verify_token(&state.settings.jwt_secret, token)?;
        Ok(Self::from_claims(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let token = issue_token("test-secret", 7, "analyst", "analyst").unwrap();
        let claims = verify_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "analyst");
        assert_eq!(claims.role, "analyst");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("test-secret", 7, "analyst", "analyst").unwrap();
        assert!(verify_token("other-secret", &token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_token("test-secret", "not-a-jwt").is_err());
    }
}
