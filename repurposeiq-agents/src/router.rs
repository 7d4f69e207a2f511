//! Query router: domain filter, agent selection, intent extraction.
//!
//! Everything here is static keyword and regex matching, compiled once.
//! Agent selection is a set of independent boolean predicates over the
//! raw query; there is no state machine and no backtracking.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

/// Generic pharma vocabulary. A query touching any of these is in-domain.
static PHARMA_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "drug", "molecule", "pharma", "pharmaceutical", "patent", "clinical",
        "trial", "market", "therapy", "disease", "indication", "repurpos",
        "fda", "regulatory", "competitor", "medicine", "treatment",
        "prescription", "dosage", "formulation", "api", "generic",
        "biosimilar", "launch", "pipeline", "sentiment", "exim", "import",
        "export", "supply chain",
    ]
    .into_iter()
    .collect()
});

/// Seeded molecule names, matched as pharma keywords too.
pub static KNOWN_MOLECULES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "metformin", "sitagliptin", "pembrolizumab", "rivaroxaban",
        "atorvastatin", "lisinopril", "amlodipine", "omeprazole",
    ]
    .into_iter()
    .collect()
});

/// Off-topic subjects. Only decisive when no pharma keyword appears.
static NON_PHARMA_TOPICS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "weather", "sports", "cooking", "recipe", "movie", "music",
        "politics", "celebrity", "game", "travel", "restaurant", "fashion",
        "stock market", "cryptocurrency",
    ]
    .into_iter()
    .collect()
});

// Per-agent routing predicates. Independent tests over the raw query.
static MARKET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)market|whitespace|competition|cagr|market size|growth rate|unmet need|opportunity").unwrap()
});
static PATENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)patent|expiry|fto|freedom to operate|\bip\b|intellectual property|filed").unwrap()
});
static CLINICAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)trial|clinical|repurpos|pipeline|phase|indication|disease|other diseases").unwrap()
});
static SOCIAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)patient|complaint|sentiment|feedback|voice").unwrap());
static COMPETITOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)competitor|war game|simulate|launch|threat").unwrap());
static EXIM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)exim|trade|import|export|supply chain|sourcing").unwrap()
});
static INTERNAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)internal|document|strategy|corporate|knowledge base").unwrap()
});

/// Multi-step product-story queries force the full analysis chain.
static END_TO_END_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)find.*molecule|identify.*unmet|check.*trial|explore.*disease|determine.*patent|product story|innovative product").unwrap()
});

/// Structured-output hints lower temperature and widen the token budget.
static STRUCTURED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)radar|heatmap|chart|graph|table|matrix|json|structured").unwrap()
});

/// The eight agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Market,
    Patent,
    Clinical,
    Social,
    Competitor,
    Exim,
    Web,
    Internal,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Patent => "patent",
            Self::Clinical => "clinical",
            Self::Social => "social",
            Self::Competitor => "competitor",
            Self::Exim => "exim",
            Self::Web => "web",
            Self::Internal => "internal",
        }
    }

    /// Section header used in the synthesis prompt and fallback output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Patent => "PATENT",
            Self::Clinical => "CLINICAL",
            Self::Social => "SOCIAL",
            Self::Competitor => "COMPETITOR",
            Self::Exim => "EXIM",
            Self::Web => "WEB",
            Self::Internal => "INTERNAL",
        }
    }

    /// Dataset the agent draws from, for report provenance.
    pub fn data_source(self) -> &'static str {
        match self {
            Self::Market => "IQVIA market dataset (embedded)",
            Self::Patent => "USPTO patent dataset (embedded)",
            Self::Clinical => "ClinicalTrials.gov dataset (embedded)",
            Self::Social => "Patient voice summaries (embedded)",
            Self::Competitor => "Competitive intelligence notes (embedded)",
            Self::Exim => "EXIM trade dataset (embedded)",
            Self::Web => "Tavily web search (live)",
            Self::Internal => "Internal knowledge base (embedded)",
        }
    }
}

/// Query intent, derived from the same keywords as routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DrugRepurposing,
    PatentAnalysis,
    ClinicalAnalysis,
    MarketAnalysis,
    RegulatoryAnalysis,
    ComprehensiveAnalysis,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DrugRepurposing => "drug_repurposing",
            Self::PatentAnalysis => "patent_analysis",
            Self::ClinicalAnalysis => "clinical_analysis",
            Self::MarketAnalysis => "market_analysis",
            Self::RegulatoryAnalysis => "regulatory_analysis",
            Self::ComprehensiveAnalysis => "comprehensive_analysis",
        }
    }
}

/// Routing decision for one query.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub agents: Vec<AgentKind>,
    pub end_to_end: bool,
}

/// Domain filter. A query is rejected only when it names an off-topic
/// subject AND carries no pharma vocabulary. Default is accept.
pub fn is_pharma_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    let has_pharma = PHARMA_KEYWORDS
        .iter()
        .chain(KNOWN_MOLECULES.iter())
        .any(|kw| lower.contains(kw));
    let has_off_topic = NON_PHARMA_TOPICS.iter().any(|topic| lower.contains(topic));

    !(has_off_topic && !has_pharma)
}

/// Select agents for a query.
///
/// The web agent is always attempted (it degrades to nothing without
/// an API key). End-to-end queries force the market/patent/clinical
/// chain; a query matching nothing falls back to market + clinical.
pub fn select_agents(query: &str) -> RoutePlan {
    let end_to_end = END_TO_END_PATTERN.is_match(query);
    let mut agents = Vec::new();

    if end_to_end || MARKET_PATTERN.is_match(query) {
        agents.push(AgentKind::Market);
    }
    if end_to_end || PATENT_PATTERN.is_match(query) {
        agents.push(AgentKind::Patent);
    }
    if end_to_end || CLINICAL_PATTERN.is_match(query) {
        agents.push(AgentKind::Clinical);
    }
    if SOCIAL_PATTERN.is_match(query) {
        agents.push(AgentKind::Social);
    }
    if COMPETITOR_PATTERN.is_match(query) {
        agents.push(AgentKind::Competitor);
    }
    if EXIM_PATTERN.is_match(query) {
        agents.push(AgentKind::Exim);
    }
    if INTERNAL_PATTERN.is_match(query) {
        agents.push(AgentKind::Internal);
    }

    if agents.is_empty() {
        agents.push(AgentKind::Market);
        agents.push(AgentKind::Clinical);
    }

    // Web search rides along with everything.
    agents.push(AgentKind::Web);

    RoutePlan { agents, end_to_end }
}

/// Classify the query's analytical intent.
pub fn extract_intent(query: &str) -> Intent {
    let lower = query.to_lowercase();
    if lower.contains("repurpos") {
        Intent::DrugRepurposing
    } else if lower.contains("patent") || lower.contains("expiry") {
        Intent::PatentAnalysis
    } else if lower.contains("trial") || lower.contains("clinical") {
        Intent::ClinicalAnalysis
    } else if lower.contains("market") || lower.contains("competition") {
        Intent::MarketAnalysis
    } else if lower.contains("regulatory") || lower.contains("fda") {
        Intent::RegulatoryAnalysis
    } else {
        Intent::ComprehensiveAnalysis
    }
}

/// Whether the user asked for chart/table/JSON-shaped output.
pub fn wants_structured_output(query: &str) -> bool {
    STRUCTURED_PATTERN.is_match(query)
}

/// Extract a seeded molecule name mentioned in the query, if any.
pub fn extract_molecule(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    KNOWN_MOLECULES
        .iter()
        .find(|m| lower.contains(*m))
        .map(|m| m.to_string())
}

/// Human-readable reasons for the routing decision.
pub fn routing_reasoning(plan: &RoutePlan) -> Vec<String> {
    let mut reasons = Vec::new();
    if plan.end_to_end {
        reasons.push(
            "End-to-end product query detected: forcing market, patent and clinical analysis"
                .to_string(),
        );
    }
    for agent in &plan.agents {
        let reason = match agent {
            AgentKind::Market => "Market terms matched: sizing and whitespace analysis",
            AgentKind::Patent => "Patent terms matched: expiry and FTO analysis",
            AgentKind::Clinical => "Clinical terms matched: trial and repurposing analysis",
            AgentKind::Social => "Patient-voice terms matched: sentiment summary",
            AgentKind::Competitor => "Competitive terms matched: threat assessment",
            AgentKind::Exim => "Trade terms matched: import/export analysis",
            AgentKind::Internal => "Internal-knowledge terms matched: document lookup",
            AgentKind::Web => "Web search attempted for fresh external context",
        };
        reasons.push(format!("{}: {}", agent.as_str(), reason));
    }
    reasons
}
