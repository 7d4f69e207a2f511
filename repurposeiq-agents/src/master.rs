//! Master agent: routing, concurrent fan-out, synthesis, tracking.
//!
//! Control flow is deliberately flat: classify, select agents, fire
//! their futures, isolate per-agent errors, then one LLM call with a
//! manual concatenation fallback. No retries, no backtracking.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use repurposeiq_llm::{ChatMessage, ChatOptions};

use crate::router::{
    extract_intent, is_pharma_query, routing_reasoning, select_agents, wants_structured_output,
    Intent,
};
use crate::{run_agent, AgentContext, AgentKind};

/// Max characters of each agent's output fed to synthesis.
const AGENT_OUTPUT_BUDGET: usize = 1500;

/// How many trailing conversation messages enrich the prompt.
const CONTEXT_MESSAGES: usize = 3;

const SYSTEM_PROMPT: &str = "You are RepurposeIQ, a pharmaceutical business \
intelligence analyst. Synthesize the agent findings below into a cohesive, \
decision-ready answer. Cite concrete numbers from the findings, call out \
risks, and finish with clear recommendations. Use markdown headings and \
tables where they help.";

static JSON_BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)```").unwrap());

/// Reasoning attached to every answer.
#[derive(Debug, Clone, Serialize)]
pub struct StrategicReasoning {
    pub reasoning: String,
    pub confidence_score: f64,
    pub decision_factors: Vec<String>,
}

/// Full answer envelope returned to the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct MasterResponse {
    pub answer: String,
    pub intent: Intent,
    pub agents_used: Vec<String>,
    pub agent_outputs: BTreeMap<String, String>,
    pub routing_reasoning: Vec<String>,
    pub strategic_reasoning: StrategicReasoning,
    pub chart_data: Option<Value>,
    pub response_time_ms: i64,
    /// True when synthesis fell back to manual concatenation.
    pub demo_mode: bool,
    pub rejected: bool,
}

/// The query router and orchestrator.
#[derive(Clone)]
pub struct MasterAgent {
    ctx: AgentContext,
}

impl MasterAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Answer a query. Never errors: rejection, agent failures and LLM
    /// failures all degrade to a usable response.
    pub async fn answer(
        &self,
        query: &str,
        history: &[ChatMessage],
        user_id: Option<i64>,
    ) -> MasterResponse {
        let started = Instant::now();

        if !is_pharma_query(query) {
            let response = MasterResponse {
                answer: REJECTION_MESSAGE.to_string(),
                intent: Intent::ComprehensiveAnalysis,
                agents_used: Vec::new(),
                agent_outputs: BTreeMap::new(),
                routing_reasoning: vec!["Query is outside the pharmaceutical domain".to_string()],
                strategic_reasoning: StrategicReasoning {
                    reasoning: "Domain filter rejected the query before routing".to_string(),
                    confidence_score: 0.95,
                    decision_factors: vec!["non-pharma topic with no pharma vocabulary".into()],
                },
                chart_data: None,
                response_time_ms: started.elapsed().as_millis() as i64,
                demo_mode: false,
                rejected: true,
            };
            self.track(user_id, query, &response, Some("non-pharma query rejected"))
                .await;
            return response;
        }

        let plan = select_agents(query);
        debug!(agents = ?plan.agents, end_to_end = plan.end_to_end, "routing plan");

        // Concurrent fan-out with per-agent error isolation.
        let futures = plan.agents.iter().map(|&kind| {
            let ctx = &self.ctx;
            async move { (kind, run_agent(kind, query, ctx).await) }
        });
        let settled = join_all(futures).await;

        let mut outputs: Vec<(AgentKind, String)> = Vec::new();
        for (kind, result) in settled {
            match result {
                Ok(output) if !output.trim().is_empty() => outputs.push((kind, output)),
                Ok(_) => debug!(agent = kind.as_str(), "agent returned no output"),
                Err(err) => warn!(agent = kind.as_str(), error = %err, "agent failed, skipping"),
            }
        }

        let options = if wants_structured_output(query) {
            ChatOptions::structured()
        } else {
            ChatOptions::default()
        };

        let prompt = build_synthesis_prompt(query, history, &outputs);
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

        let (answer, demo_mode) = match self.ctx.groq.chat(&messages, options).await {
            Ok(answer) => (answer, false),
            Err(err) => {
                warn!(error = %err, "synthesis failed, combining agent outputs manually");
                (combine_manually(&outputs), true)
            }
        };

        let response = MasterResponse {
            intent: extract_intent(query),
            agents_used: outputs.iter().map(|(k, _)| k.as_str().to_string()).collect(),
            agent_outputs: outputs
                .iter()
                .map(|(k, out)| (k.as_str().to_string(), out.clone()))
                .collect(),
            routing_reasoning: routing_reasoning(&plan),
            strategic_reasoning: StrategicReasoning {
                reasoning: if plan.end_to_end {
                    "End-to-end product analysis across market, patent and clinical dimensions"
                        .to_string()
                } else {
                    format!("Targeted analysis across {} agent(s)", outputs.len())
                },
                confidence_score: extract_confidence(&answer),
                decision_factors: outputs
                    .iter()
                    .map(|(k, _)| k.data_source().to_string())
                    .collect(),
            },
            chart_data: extract_chart_data(&answer),
            answer,
            response_time_ms: started.elapsed().as_millis() as i64,
            demo_mode,
            rejected: false,
        };

        self.track(user_id, query, &response, None).await;
        response
    }

    /// Best-effort usage tracking; failures are logged, never surfaced.
    async fn track(
        &self,
        user_id: Option<i64>,
        query: &str,
        response: &MasterResponse,
        error_message: Option<&str>,
    ) {
        let agents_json = serde_json::to_string(&response.agents_used).unwrap_or_default();
        let result = sqlx::query(
            "INSERT INTO query_tracking \
             (user_id, query_text, agents_used, response_time_ms, success, error_message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(query)
        .bind(agents_json)
        .bind(response.response_time_ms)
        .bind(!response.rejected)
        .bind(error_message)
        .bind(Utc::now())
        .execute(&self.ctx.pool)
        .await;

        if let Err(err) = result {
            warn!(error = %err, "query tracking insert failed");
        }
    }
}

const REJECTION_MESSAGE: &str = "I focus on pharmaceutical business \
intelligence: market analysis, patents, clinical trials, trade data and \
competitive strategy. Try asking about a molecule, therapy area or market \
instead.";

fn build_synthesis_prompt(
    query: &str,
    history: &[ChatMessage],
    outputs: &[(AgentKind, String)],
) -> String {
    let mut prompt = String::new();

    let recent: Vec<&ChatMessage> = history.iter().rev().take(CONTEXT_MESSAGES).collect();
    if !recent.is_empty() {
        prompt.push_str("Conversation context:\n");
        for message in recent.into_iter().rev() {
            prompt.push_str(&format!("{}: {}\n", message.role, message.content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("Query: {query}\n\nAgent findings:\n\n"));
    for (kind, output) in outputs {
        prompt.push_str(&format!(
            "[{}]\n{}\n\n",
            kind.label(),
            truncate_chars(output, AGENT_OUTPUT_BUDGET)
        ));
    }
    prompt
}

/// Manual fallback when the synthesis model is unavailable.
fn combine_manually(outputs: &[(AgentKind, String)]) -> String {
    let mut out = String::from("## Pharmaceutical Intelligence Analysis\n\n");
    if outputs.is_empty() {
        out.push_str("No agent produced findings for this query.\n");
        return out;
    }
    for (kind, output) in outputs {
        out.push_str(&format!("## {} Findings\n\n{}\n\n", kind.label(), output));
    }
    out.push_str("_Synthesis model unavailable; direct agent findings shown._\n");
    out
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(budget).collect();
        format!("{truncated}...")
    }
}

/// Pull a confidence score out of the synthesis narrative.
fn extract_confidence(answer: &str) -> f64 {
    let lower = answer.to_lowercase();
    if lower.contains("high confidence") {
        0.85
    } else if lower.contains("medium confidence") || lower.contains("moderate confidence") {
        0.65
    } else if lower.contains("low confidence") {
        0.45
    } else {
        0.70
    }
}

/// Extract chart data from a ```json code block, if the model emitted one.
fn extract_chart_data(answer: &str) -> Option<Value> {
    let captures = JSON_BLOCK_PATTERN.captures(answer)?;
    serde_json::from_str(captures.get(1)?.as_str().trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        context_with, create_query_tracking, memory_pool, seed_clinical_trials, seed_market_data,
    };

    #[test]
    fn confidence_extraction_bands() {
        assert_eq!(extract_confidence("We have high confidence in this."), 0.85);
        assert_eq!(extract_confidence("Moderate confidence overall."), 0.65);
        assert_eq!(extract_confidence("low confidence due to data gaps"), 0.45);
        assert_eq!(extract_confidence("no signal either way"), 0.70);
    }

    #[test]
    fn chart_data_parses_json_blocks() {
        let answer = "Here you go:\n```json\n{\"labels\": [\"A\"], \"values\": [1]}\n```\ndone";
        let chart = extract_chart_data(answer).unwrap();
        assert_eq!(chart["labels"][0], "A");

        assert!(extract_chart_data("no chart here").is_none());
        assert!(extract_chart_data("```json\nnot json\n```").is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(2000);
        let truncated = truncate_chars(&text, 1500);
        assert_eq!(truncated.chars().count(), 1503); // 1500 + "..."

        let short = truncate_chars("short", 1500);
        assert_eq!(short, "short");
    }

    #[test]
    fn manual_fallback_has_section_per_agent() {
        let outputs = vec![
            (AgentKind::Market, "market stuff".to_string()),
            (AgentKind::Patent, "patent stuff".to_string()),
        ];
        let combined = combine_manually(&outputs);
        assert!(combined.starts_with("## Pharmaceutical Intelligence Analysis"));
        assert!(combined.contains("## MARKET Findings"));
        assert!(combined.contains("## PATENT Findings"));
    }

    #[tokio::test]
    async fn non_pharma_query_is_rejected_without_agents() {
        let pool = memory_pool().await;
        create_query_tracking(&pool).await;
        let agent = MasterAgent::new(context_with(pool).await);

        let response = agent.answer("what is the weather today", &[], None).await;
        assert!(response.rejected);
        assert!(response.agents_used.is_empty());
        assert!(response.answer.contains("pharmaceutical"));
    }

    #[tokio::test]
    async fn fallback_synthesis_concatenates_agent_findings() {
        let pool = memory_pool().await;
        create_query_tracking(&pool).await;
        seed_market_data(&pool).await;
        let agent = MasterAgent::new(context_with(pool).await);

        let response = agent
            .answer("market size for metformin", &[], Some(1))
            .await;
        assert!(response.demo_mode);
        assert!(!response.rejected);
        assert!(response.agents_used.contains(&"market".to_string()));
        assert!(response.answer.contains("Pharmaceutical Intelligence Analysis"));
        assert!(response.answer.contains("MARKET Findings"));
    }

    #[tokio::test]
    async fn failed_agents_are_isolated() {
        // No tables at all: every SQL-backed agent errors, the static
        // ones still answer.
        let pool = memory_pool().await;
        create_query_tracking(&pool).await;
        let agent = MasterAgent::new(context_with(pool).await);

        let response = agent
            .answer(
                "market and patient sentiment for metformin competitors",
                &[],
                None,
            )
            .await;
        assert!(!response.agents_used.contains(&"market".to_string()));
        assert!(response.agents_used.contains(&"social".to_string()));
        assert!(response.agents_used.contains(&"competitor".to_string()));
    }

    #[tokio::test]
    async fn tracking_records_the_query() {
        let pool = memory_pool().await;
        create_query_tracking(&pool).await;
        seed_market_data(&pool).await;
        seed_clinical_trials(&pool).await;
        let agent = MasterAgent::new(context_with(pool.clone()).await);

        agent
            .answer("repurposing trials for metformin", &[], Some(7))
            .await;

        let (count, user_id): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), MAX(user_id) FROM query_tracking")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert_eq!(user_id, 7);
    }

    #[tokio::test]
    async fn history_enriches_the_prompt() {
        let history = vec![
            ChatMessage::user("tell me about metformin"),
            ChatMessage::assistant("metformin is a biguanide"),
            ChatMessage::user("what about its market"),
            ChatMessage::assistant("market is large"),
        ];
        let prompt = build_synthesis_prompt("and the patents?", &history, &[]);
        // Only the last three messages survive, oldest first.
        assert!(!prompt.contains("tell me about metformin"));
        let first = prompt.find("metformin is a biguanide").unwrap();
        let last = prompt.find("market is large").unwrap();
        assert!(first < last);
    }
}
