//! Repository structs, one per table group.
//!
//! Each repo borrows the pool and exposes typed queries. `NotFound`
//! carries the resource name so HTTP handlers can map it to 404
//! without re-matching on SQL states.

pub mod alerts;
pub mod contacts;
pub mod conversations;
pub mod dashboard;
pub mod sentiment;
pub mod suggestions;
pub mod tracking;
pub mod usage;
pub mod users;
pub mod workflows;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
