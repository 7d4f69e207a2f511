//! Competitor agent: threat assessment and launch war-gaming.
//!
//! Static competitive notes, with a scenario section when the query
//! asks to simulate a launch.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::router::extract_molecule;
use crate::{AgentContext, AgentError};

static WAR_GAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)war game|simulate|scenario").unwrap());

/// Render the competitive assessment for a query.
pub async fn process(query: &str, _ctx: &AgentContext) -> Result<String, AgentError> {
    let molecule = extract_molecule(query);

    let mut out = String::from("### Competitive Intelligence\n\n");
    out.push_str(
        "Primary threats this quarter: aggressive generic pricing in diabetes, \
         biosimilar entries in oncology, and accelerated lifecycle filings from \
         the top-3 originators.\n\n\
         - Diabetes: Teva and Sun Pharma expanding metformin combination lines\n\
         - Oncology: two PD-1 biosimilar programs in late Phase 3\n\
         - Anticoagulants: rivaroxaban generics cleared in two major markets\n",
    );

    if WAR_GAME_PATTERN.is_match(query) {
        let subject = molecule.as_deref().unwrap_or("the candidate molecule");
        out.push_str(&format!(
            "\n**Launch War Game: {subject}**\n\n\
             - Scenario A (price leader): undercut originator by 40%, expect \
               retaliatory rebates within two quarters\n\
             - Scenario B (differentiated label): lead with the repurposed \
               indication, slower uptake but defensible share\n\
             - Scenario C (partnership): co-market with an established generics \
               player, margin trade-off for channel reach\n",
        ));
    }

    Ok(out)
}
