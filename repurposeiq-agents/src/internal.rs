//! Internal agent: corporate knowledge base lookup.
//!
//! The knowledge base is two literal documents; retrieval is substring
//! matching against title and body.

use crate::{AgentContext, AgentError};

struct InternalDoc {
    title: &'static str,
    body: &'static str,
}

static DOCS: &[InternalDoc] = &[
    InternalDoc {
        title: "Corporate Strategy 2026: Generics and Repurposing",
        body: "Strategic priority on off-patent molecules with repurposing \
               potential in oncology and neurology. Metformin oncology program \
               cleared internal review; partnership discussions open for \
               sitagliptin lifecycle management. Capital allocation favors \
               assets with patent expiry within 3 years.",
    },
    InternalDoc {
        title: "Supply Chain Risk Memo: API Sourcing",
        body: "Internal audit flags single-country concentration in metformin \
               API sourcing. Recommendation: qualify a second supplier outside \
               China within 18 months and hedge pricing on long-term contracts.",
    },
];

/// Render matching internal documents for a query.
pub async fn process(query: &str, _ctx: &AgentContext) -> Result<String, AgentError> {
    let lower = query.to_lowercase();
    let terms: Vec<&str> = lower.split_whitespace().filter(|w| w.len() > 3).collect();

    let matches: Vec<&InternalDoc> = DOCS
        .iter()
        .filter(|doc| {
            let haystack = format!("{} {}", doc.title, doc.body).to_lowercase();
            terms.is_empty() || terms.iter().any(|term| haystack.contains(term))
        })
        .collect();

    if matches.is_empty() {
        return Ok(
            "### Internal Knowledge\n\nNo internal documents matched this query.".to_string(),
        );
    }

    let mut out = String::from("### Internal Knowledge\n\n");
    for doc in matches {
        out.push_str(&format!("**{}**\n\n{}\n\n", doc.title, doc.body));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, memory_pool};

    #[tokio::test]
    async fn matches_on_body_terms() {
        let ctx = context_with(memory_pool().await).await;
        let out = process("supplier sourcing audit", &ctx).await.unwrap();
        assert!(out.contains("Supply Chain Risk Memo"));
        assert!(!out.contains("Corporate Strategy 2026"));
    }

    #[tokio::test]
    async fn unmatched_query_reports_no_documents() {
        let ctx = context_with(memory_pool().await).await;
        let out = process("zzzz qqqqq", &ctx).await.unwrap();
        assert!(out.contains("No internal documents"));
    }
}
