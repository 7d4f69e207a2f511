//! repurposeiq-agents: query routing and agent modules.
//!
//! The master agent classifies a natural-language pharma query with
//! static keyword/regex predicates, fans out to the matching agents
//! concurrently, and synthesizes their markdown outputs through Groq
//! (with a manual concatenation fallback).
//!
//! Agents are template-fillers over seeded SQLite rows or literal mock
//! tables. They carry no state and no retry logic; a failing agent is
//! logged and skipped.

pub mod clinical;
pub mod competitor;
pub mod exim;
pub mod internal;
pub mod market;
pub mod master;
pub mod patent;
pub mod router;
pub mod social;
pub mod web;

use sqlx::SqlitePool;
use thiserror::Error;

use repurposeiq_llm::{GroqClient, LlmError, TavilyClient};

pub use master::{MasterAgent, MasterResponse, StrategicReasoning};
pub use router::{AgentKind, Intent, RoutePlan};

/// Shared context handed to every agent invocation.
#[derive(Clone)]
pub struct AgentContext {
    pub pool: SqlitePool,
    pub groq: GroqClient,
    pub tavily: TavilyClient,
}

/// Errors an agent can hit. Master isolation logs these and moves on.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("upstream API error: {0}")]
    Llm(#[from] LlmError),
}

/// Dispatch a single agent by kind.
pub async fn run_agent(
    kind: AgentKind,
    query: &str,
    ctx: &AgentContext,
) -> Result<String, AgentError> {
    match kind {
        AgentKind::Market => market::process(query, ctx).await,
        AgentKind::Patent => patent::process(query, ctx).await,
        AgentKind::Clinical => clinical::process(query, ctx).await,
        AgentKind::Social => social::process(query, ctx).await,
        AgentKind::Competitor => competitor::process(query, ctx).await,
        AgentKind::Exim => exim::process(query, ctx).await,
        AgentKind::Web => web::process(query, ctx).await,
        AgentKind::Internal => internal::process(query, ctx).await,
    }
}
