//! Web agent: live search through Tavily.
//!
//! Always attempted by the router; returns an empty string when the
//! search API is unconfigured so the master agent can drop it silently.

use crate::{AgentContext, AgentError};

const SNIPPET_CHARS: usize = 300;

/// Render live web findings for a query.
pub async fn process(query: &str, ctx: &AgentContext) -> Result<String, AgentError> {
    let Some(results) = ctx.tavily.search(query).await? else {
        return Ok(String::new());
    };

    if results.is_empty() {
        return Ok(String::new());
    }

    let mut out = String::from("### Web Intelligence\n\n");
    for result in results {
        let snippet: String = result.content.chars().take(SNIPPET_CHARS).collect();
        out.push_str(&format!("- **{}** ({})\n", result.title, result.url));
        if !snippet.is_empty() {
            out.push_str(&format!("  {snippet}\n"));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, memory_pool};

    #[tokio::test]
    async fn unconfigured_search_yields_nothing() {
        let ctx = context_with(memory_pool().await).await;
        let out = process("metformin oncology news", &ctx).await.unwrap();
        assert!(out.is_empty());
    }
}
