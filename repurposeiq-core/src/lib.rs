//! repurposeiq-core: shared error types and configuration loading.
//!
//! The binary crate (repurposeiq-cli) uses `anyhow` for convenience;
//! library consumers get structured, composable errors from here.

pub mod config;
pub mod error;

pub use config::Settings;
pub use error::{CoreError, Result};
