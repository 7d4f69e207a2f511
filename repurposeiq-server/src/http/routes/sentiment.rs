//! Sentiment analysis over patient and provider chatter.
//!
//! Results are cached per molecule for an hour, persisted for the
//! history view.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use repurposeiq_agents::router::AgentKind;
use repurposeiq_llm::{ChatMessage, ChatOptions};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::db::repos::sentiment::{SentimentRepo, SentimentRow};
use crate::http::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::rate_limit;

const CACHE_TTL_HOURS: i64 = 1;

#[derive(Deserialize)]
pub struct HistoryParams {
    /// Only return snapshots from the last N days.
    pub days: Option<i64>,
}

#[derive(Deserialize)]
struct LlmSentiment {
    sentiment_score: f64,
    sentiment_label: String,
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// POST /api/sentiment/{molecule}
async fn analyze(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(molecule): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let molecule = molecule.trim().to_lowercase();
    if molecule.is_empty() {
        return Err(ApiError::validation("molecule must not be empty"));
    }

    {
        let cache = state.sentiment_cache.lock().await;
        if let Some((at, payload)) = cache.get(&molecule) {
            if *at > Utc::now() - Duration::hours(CACHE_TTL_HOURS) {
                return Ok(Json(payload.clone()));
            }
        }
    }

    rate_limit::check(&state.pool, "groq", user.id, &user.role).await?;

    let ctx = state.master.context();
    let chatter = repurposeiq_agents::run_agent(AgentKind::Social, &molecule, ctx)
        .await
        .map_err(|e| ApiError::internal(format!("social agent failed: {e}")))?;

    let prompt = format!(
        "Analyze the sentiment of the following patient and provider chatter about {molecule}. \
         Respond with JSON only: {{\"sentiment_score\": -1.0..1.0, \"sentiment_label\": \
         \"positive|neutral|negative\", \"summary\": \"...\", \"keywords\": [\"...\"]}}\n\n{chatter}"
    );
    let (raw, demo_mode) = ctx
        .groq
        .complete(&[ChatMessage::user(prompt)], ChatOptions::structured())
        .await;
    rate_limit::record(&state.pool, "groq", user.id).await?;

    let parsed = parse_sentiment(&raw).unwrap_or_else(|| {
        debug!(molecule = %molecule, "sentiment response unparseable, using neutral");
        LlmSentiment {
            sentiment_score: 0.0,
            sentiment_label: "neutral".into(),
            summary: chatter.clone(),
            keywords: Vec::new(),
        }
    });

    let keywords_json = serde_json::to_string(&parsed.keywords).unwrap_or_else(|_| "[]".into());
    SentimentRepo::new(&state.pool)
        .insert(
            &molecule,
            "llm",
            &parsed.summary,
            parsed.sentiment_score,
            &parsed.sentiment_label,
            &keywords_json,
        )
        .await?;

    let payload = json!({
        "molecule": molecule,
        "sentiment_score": parsed.sentiment_score,
        "sentiment_label": parsed.sentiment_label,
        "summary": parsed.summary,
        "keywords": parsed.keywords,
        "demo_mode": demo_mode,
        "analyzed_at": Utc::now().to_rfc3339(),
    });

    state
        .sentiment_cache
        .lock()
        .await
        .insert(molecule, (Utc::now(), payload.clone()));
    Ok(Json(payload))
}

/// GET /api/sentiment/{molecule}/history?days=30
async fn history(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(molecule): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<SentimentRow>>, ApiError> {
    let mut rows = SentimentRepo::new(&state.pool).history(&molecule).await?;
    if let Some(days) = params.days {
        let cutoff = Utc::now() - Duration::days(days.max(0));
        rows.retain(|r| r.created_at >= cutoff);
    }
    Ok(Json(rows))
}

/// Accept a bare JSON object or one wrapped in a ```json block.
fn parse_sentiment(raw: &str) -> Option<LlmSentiment> {
    if let Ok(parsed) = serde_json::from_str(raw.trim()) {
        return Some(parsed);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    serde_json::from_str(&raw[start..=end]).ok()
}

/// Sentiment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sentiment/{molecule}", post(analyze))
        .route("/sentiment/{molecule}/history", get(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use axum::extract::State;

    fn analyst() -> AuthUser {
        AuthUser {
            id: 2,
            username: "analyst".into(),
            role: "analyst".into(),
        }
    }

    #[test]
    fn parse_handles_wrapped_json() {
        let raw = "Here you go:\n```json\n{\"sentiment_score\": 0.4, \
                   \"sentiment_label\": \"positive\", \"summary\": \"mostly good\", \
                   \"keywords\": [\"tolerable\"]}\n```";
        let parsed = parse_sentiment(raw).unwrap();
        assert_eq!(parsed.sentiment_label, "positive");
        assert!(parse_sentiment("no json here").is_none());
    }

    #[tokio::test]
    async fn analyze_persists_and_caches() {
        let state = test_state().await;
        let Json(first) = analyze(State(state.clone()), analyst(), Path("Metformin".into()))
            .await
            .unwrap();
        assert_eq!(first["molecule"], "metformin");

        // Second call inside the TTL is served from cache: no new row.
        analyze(State(state.clone()), analyst(), Path("metformin".into()))
            .await
            .unwrap();

        let Json(rows) = history(
            State(state),
            analyst(),
            Path("metformin".into()),
            Query(HistoryParams { days: Some(7) }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
