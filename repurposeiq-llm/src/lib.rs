//! repurposeiq-llm: hosted API clients.
//!
//! Two integrations, both optional at runtime:
//! - Groq chat completions for answer synthesis
//! - Tavily web search for the web agent
//!
//! Neither client fails hard when unconfigured. Groq falls back to a
//! canned demo completion, Tavily reports no results. The product has
//! to stay demoable on a laptop with no API keys.

pub mod groq;
pub mod tavily;

use thiserror::Error;

pub use groq::{ChatMessage, ChatOptions, GroqClient};
pub use tavily::{TavilyClient, WebResult};

/// Errors from hosted API calls.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API key not configured for {service}")]
    NotConfigured { service: &'static str },

    #[error("Malformed response from {service}: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, LlmError>;
