//! Social agent: patient-voice sentiment summaries.
//!
//! Static intelligence notes standing in for social listening feeds.

use crate::router::extract_molecule;
use crate::{AgentContext, AgentError};

/// Render the patient-voice summary for a query.
pub async fn process(query: &str, _ctx: &AgentContext) -> Result<String, AgentError> {
    let molecule = extract_molecule(query);

    let mut out = String::from("### Patient Voice\n\n");
    match molecule.as_deref() {
        Some("metformin") => {
            out.push_str(
                "Patient forums trend positive on metformin tolerability; recurring \
                 complaints center on gastrointestinal side effects during titration. \
                 Growing discussion threads on off-label longevity use.\n\n\
                 - Sentiment: mildly positive\n\
                 - Top complaint: GI discomfort in the first month\n\
                 - Emerging topic: metformin in oncology prevention studies\n",
            );
        }
        Some("pembrolizumab") => {
            out.push_str(
                "Oncology patient communities report high treatment expectations and \
                 anxiety around access and cost. Caregiver feedback highlights infusion \
                 scheduling burden.\n\n\
                 - Sentiment: hopeful but cost-sensitive\n\
                 - Top complaint: access and reimbursement friction\n",
            );
        }
        Some(other) => {
            out.push_str(&format!(
                "Monitoring shows moderate discussion volume for {other}. Feedback \
                 clusters around pricing, availability and side-effect management; no \
                 acute safety signals in the current window.\n",
            ));
        }
        None => {
            out.push_str(
                "Cross-portfolio listening shows stable sentiment. Pricing and access \
                 remain the dominant complaint categories; adherence-support content \
                 drives the most positive engagement.\n",
            );
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, memory_pool};

    #[tokio::test]
    async fn molecule_specific_summary() {
        let ctx = context_with(memory_pool().await).await;
        let out = process("patient sentiment for metformin", &ctx).await.unwrap();
        assert!(out.contains("gastrointestinal"));
    }

    #[tokio::test]
    async fn portfolio_summary_without_molecule() {
        let ctx = context_with(memory_pool().await).await;
        let out = process("patient feedback overview", &ctx).await.unwrap();
        assert!(out.contains("Cross-portfolio"));
    }
}
