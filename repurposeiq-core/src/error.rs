/// Structured error types for repurposeiq-core.
///
/// Uses `thiserror` for better API surface and error composition.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for repurposeiq-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Required environment variable missing
    #[error("Missing environment variable '{var}'")]
    MissingEnv { var: String },

    /// File or directory not found
    #[error("Path not found: {path:?}")]
    PathNotFound { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for repurposeiq-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a missing environment variable error
    pub fn missing_env(var: impl Into<String>) -> Self {
        Self::MissingEnv { var: var.into() }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let err = CoreError::missing_env("JWT_SECRET");
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = CoreError::config("bad bind address");
        assert!(err.to_string().contains("bad bind address"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
