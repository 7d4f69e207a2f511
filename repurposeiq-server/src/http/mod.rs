//! HTTP API surface.

pub mod auth;
pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{run_server, AppState, ServerConfig};
