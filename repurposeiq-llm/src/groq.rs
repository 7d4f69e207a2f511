//! Groq chat-completions client.
//!
//! OpenAI-compatible endpoint. Without a key, or when the upstream call
//! fails, `complete()` returns a deterministic demo answer instead of an
//! error so the rest of the pipeline keeps working.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{LlmError, Result};

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// One message in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Sampling options for a completion call.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

impl ChatOptions {
    /// Settings for structured output (charts, tables, JSON).
    pub fn structured() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

/// Groq API client.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
        }
    }

    /// Whether a real API key is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Raw chat-completion call. Errors when unconfigured or on HTTP failure.
    pub async fn chat(&self, messages: &[ChatMessage], options: ChatOptions) -> Result<String> {
        #[derive(Serialize)]
        struct CompletionRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct CompletionResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::NotConfigured { service: "groq" })?;

        let response = self
            .http
            .post(GROQ_URL)
            .bearer_auth(api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<CompletionResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::Malformed {
                service: "groq",
                reason: "empty choices array".into(),
            })
    }

    /// Chat completion with demo fallback.
    ///
    /// Returns the synthesized answer, or a canned completion when the
    /// API is unconfigured or errors. The boolean is true when the demo
    /// path was taken.
    pub async fn complete(&self, messages: &[ChatMessage], options: ChatOptions) -> (String, bool) {
        match self.chat(messages, options).await {
            Ok(answer) => (answer, false),
            Err(LlmError::NotConfigured { .. }) => (demo_completion(messages), true),
            Err(err) => {
                warn!(error = %err, "Groq call failed, using demo completion");
                (demo_completion(messages), true)
            }
        }
    }
}

/// Canned completion used when no Groq key is available.
fn demo_completion(messages: &[ChatMessage]) -> String {
    let topic = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| first_line(&m.content))
        .unwrap_or_else(|| "your query".to_string());

    format!(
        "## Analysis (Demo Mode)\n\n\
         This is a simulated response for: {topic}\n\n\
         The live synthesis model is not configured (set GROQ_API_KEY to \
         enable it). The agent findings below were assembled from the \
         embedded datasets and reflect real routing behavior.\n\n\
         **Key observations:**\n\
         - Agent routing and data retrieval executed normally\n\
         - Only the final narrative synthesis is simulated\n"
    )
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or(text);
    if line.chars().count() > 120 {
        let truncated: String = line.chars().take(120).collect();
        format!("{truncated}...")
    } else {
        line.to_string()
    }
}
