//! Public view of a user account.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::repos::users::User;

/// User shape returned by auth endpoints. Never carries the hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
