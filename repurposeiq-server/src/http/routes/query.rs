//! The main query endpoint.
//!
//! Validates, rate-limits, persists the exchange to a conversation,
//! and delegates orchestration to the master agent.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use once_cell::sync::Lazy;
use repurposeiq_agents::master::MasterResponse;
use repurposeiq_agents::router::AgentKind;
use repurposeiq_llm::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::db::repos::conversations::ConversationRepo;
use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::rate_limit;

/// Queries shorter than this many words are treated as follow-ups.
const FOLLOW_UP_MAX_WORDS: usize = 5;

/// How many prior messages feed the synthesis context.
const HISTORY_MESSAGES: i64 = 6;

static FOLLOW_UP_OPENERS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "what about", "how about", "and ", "also ", "why", "tell me more", "more detail",
        "elaborate", "expand on", "compare that", "same for",
    ]
});

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub conversation_id: i64,
    pub is_follow_up: bool,
    #[serde(flatten)]
    pub result: MasterResponse,
}

/// A short or referential message leans on conversation history.
fn is_follow_up(query: &str) -> bool {
    let lowered = query.trim().to_lowercase();
    if lowered.split_whitespace().count() < FOLLOW_UP_MAX_WORDS {
        return true;
    }
    FOLLOW_UP_OPENERS.iter().any(|p| lowered.starts_with(p))
}

/// POST /api/query
async fn run_query(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::validation("query must not be empty"));
    }

    rate_limit::check(&state.pool, "groq", user.id, &user.role).await?;

    let repo = ConversationRepo::new(&state.pool);
    let conversation = match req.conversation_id {
        Some(id) => repo.by_id(id, user.id).await?,
        None => repo.create(user.id, query).await?,
    };

    // Follow-ups carry prior turns into the synthesis prompt; a fresh
    // full question in the same thread stands on its own.
    let follow_up = req.conversation_id.is_some() && is_follow_up(query);
    let history: Vec<ChatMessage> = if follow_up {
        repo.recent_messages(conversation.id, HISTORY_MESSAGES)
            .await?
            .into_iter()
            .map(|m| match m.role.as_str() {
                "assistant" => ChatMessage::assistant(m.content),
                _ => ChatMessage::user(m.content),
            })
            .collect()
    } else {
        Vec::new()
    };

    repo.append_message(conversation.id, "user", query, None).await?;

    let result = state.master.answer(query, &history, Some(user.id)).await;

    let agents_json = serde_json::to_string(&result.agents_used).unwrap_or_default();
    repo.append_message(conversation.id, "assistant", &result.answer, Some(&agents_json))
        .await?;

    rate_limit::record(&state.pool, "groq", user.id).await?;
    if result.agents_used.iter().any(|a| a == AgentKind::Web.as_str()) {
        rate_limit::record(&state.pool, "tavily", user.id).await?;
    }

    Ok(Json(QueryResponse {
        conversation_id: conversation.id,
        is_follow_up: follow_up,
        result,
    }))
}

/// Query routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/query", post(run_query))
}
