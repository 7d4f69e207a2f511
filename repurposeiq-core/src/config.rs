//! Environment-backed configuration.
//!
//! All runtime settings come from the process environment, optionally
//! seeded from a `.env` file in the working directory. Nothing here
//! panics on a missing value: optional integrations (Groq, Tavily)
//! simply stay unconfigured and callers degrade to demo behavior.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;

/// Default SQLite database location (created on first run).
const DEFAULT_DATABASE_URL: &str = "sqlite://repurposeiq.db?mode=rwc";

/// Default Groq model for synthesis calls.
const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite connection string (DATABASE_URL)
    pub database_url: String,
    /// HMAC secret for JWT signing (JWT_SECRET)
    pub jwt_secret: String,
    /// Groq API key; None leaves the LLM in demo mode (GROQ_API_KEY)
    pub groq_api_key: Option<String>,
    /// Groq model name (GROQ_MODEL)
    pub groq_model: String,
    /// Tavily API key; None disables web search (TAVILY_API_KEY)
    pub tavily_api_key: Option<String>,
    /// Directory for generated reports (REPURPOSEIQ_REPORTS_DIR)
    pub reports_dir: PathBuf,
    /// Directory for uploaded files (REPURPOSEIQ_UPLOADS_DIR)
    pub uploads_dir: PathBuf,
}

impl Settings {
    /// Resolve settings from the environment.
    ///
    /// Reads `.env` first (existing variables win, per dotenvy semantics).
    pub fn from_env() -> Result<Self> {
        load_dotenv();

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, using insecure default (development only)");
                "secret".to_string()
            }
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            groq_api_key: non_empty_var("GROQ_API_KEY"),
            groq_model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| DEFAULT_GROQ_MODEL.to_string()),
            tavily_api_key: non_empty_var("TAVILY_API_KEY"),
            reports_dir: dir_var("REPURPOSEIQ_REPORTS_DIR", "reports"),
            uploads_dir: dir_var("REPURPOSEIQ_UPLOADS_DIR", "uploads"),
        })
    }
}

/// Load `.env` from the current directory if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded .env from {}", path.display()),
        Err(_) => debug!("No .env file found, using environment variables only"),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn dir_var(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_counts_as_unset() {
        std::env::set_var("REPURPOSEIQ_TEST_EMPTY", "   ");
        assert_eq!(non_empty_var("REPURPOSEIQ_TEST_EMPTY"), None);
        std::env::remove_var("REPURPOSEIQ_TEST_EMPTY");
    }

    #[test]
    fn dir_var_falls_back_to_default() {
        std::env::remove_var("REPURPOSEIQ_TEST_DIR");
        assert_eq!(
            dir_var("REPURPOSEIQ_TEST_DIR", "reports"),
            PathBuf::from("reports")
        );
    }
}
