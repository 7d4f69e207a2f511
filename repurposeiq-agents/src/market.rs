//! Market agent: sizing, whitespace and competitive analysis over the
//! embedded market dataset.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sqlx::FromRow;

use crate::router::extract_molecule;
use crate::{AgentContext, AgentError};

/// Whitespace thresholds: low competition, meaningful patient burden.
const WHITESPACE_MAX_COMPETITION: f64 = 0.3;
const WHITESPACE_MIN_BURDEN: f64 = 0.5;

static THERAPY_AREAS: &[&str] = &[
    "Diabetes",
    "Oncology",
    "Cardiovascular",
    "Neurology",
    "Gastroenterology",
];

static YEARS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*year").unwrap());

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MarketRow {
    pub molecule: String,
    pub region: String,
    pub therapy_area: String,
    pub indication: Option<String>,
    pub market_size_usd_mn: f64,
    pub cagr_percent: f64,
    pub top_competitors: Option<String>,
    pub generic_penetration: f64,
    pub patient_burden: f64,
    pub competition_level: f64,
}

impl MarketRow {
    /// Whitespace score: bigger markets with low competition and high
    /// unmet patient burden score higher.
    pub fn opportunity_score(&self) -> f64 {
        (self.market_size_usd_mn / 1000.0)
            * (1.0 - self.competition_level)
            * self.patient_burden
    }

    pub fn is_whitespace(&self) -> bool {
        self.competition_level < WHITESPACE_MAX_COMPETITION
            && self.patient_burden > WHITESPACE_MIN_BURDEN
    }

    /// Projected size after `years` of compounding at the current CAGR.
    pub fn projected_size(&self, years: u32) -> f64 {
        self.market_size_usd_mn * (1.0 + self.cagr_percent / 100.0).powi(years as i32)
    }
}

/// Herfindahl-Hirschman index over market-size shares, on the 0-10000
/// scale used by competition regulators.
pub fn hhi(sizes: &[f64]) -> f64 {
    let total: f64 = sizes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    sizes
        .iter()
        .map(|size| {
            let share = size / total * 100.0;
            share * share
        })
        .sum()
}

/// Standard HHI concentration bands.
pub fn concentration_label(index: f64) -> &'static str {
    if index < 1500.0 {
        "Low"
    } else if index < 2500.0 {
        "Moderate"
    } else {
        "High"
    }
}

fn extract_therapy_area(query: &str) -> Option<&'static str> {
    let lower = query.to_lowercase();
    THERAPY_AREAS
        .iter()
        .find(|area| lower.contains(&area.to_lowercase()))
        .copied()
}

fn extract_years(query: &str) -> Option<u32> {
    YEARS_PATTERN
        .captures(query)
        .and_then(|cap| cap[1].parse().ok())
}

async fn fetch_rows(
    ctx: &AgentContext,
    molecule: Option<&str>,
    therapy_area: Option<&str>,
) -> Result<Vec<MarketRow>, AgentError> {
    let rows = match (molecule, therapy_area) {
        (Some(molecule), _) => {
            sqlx::query_as::<_, MarketRow>(
                "SELECT molecule, region, therapy_area, indication, market_size_usd_mn, \
                 cagr_percent, top_competitors, generic_penetration, patient_burden, \
                 competition_level FROM market_data WHERE LOWER(molecule) = LOWER(?)",
            )
            .bind(molecule)
            .fetch_all(&ctx.pool)
            .await?
        }
        (None, Some(area)) => {
            sqlx::query_as::<_, MarketRow>(
                "SELECT molecule, region, therapy_area, indication, market_size_usd_mn, \
                 cagr_percent, top_competitors, generic_penetration, patient_burden, \
                 competition_level FROM market_data WHERE therapy_area = ?",
            )
            .bind(area)
            .fetch_all(&ctx.pool)
            .await?
        }
        (None, None) => {
            sqlx::query_as::<_, MarketRow>(
                "SELECT molecule, region, therapy_area, indication, market_size_usd_mn, \
                 cagr_percent, top_competitors, generic_penetration, patient_burden, \
                 competition_level FROM market_data ORDER BY market_size_usd_mn DESC",
            )
            .fetch_all(&ctx.pool)
            .await?
        }
    };
    Ok(rows)
}

/// Render the market analysis for a query.
pub async fn process(query: &str, ctx: &AgentContext) -> Result<String, AgentError> {
    let molecule = extract_molecule(query);
    let therapy_area = extract_therapy_area(query);
    let rows = fetch_rows(ctx, molecule.as_deref(), therapy_area).await?;

    if rows.is_empty() {
        return Ok("### Market Analysis\n\nNo market data available for this query.".to_string());
    }

    let lower = query.to_lowercase();
    let mut out = String::from("### Market Analysis\n\n");

    out.push_str("| Molecule | Therapy Area | Market Size (USD mn) | CAGR % | Generic Penetration | Competition |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for row in rows.iter().take(5) {
        out.push_str(&format!(
            "| {} | {} | {:.0} | {:.1} | {:.0}% | {:.2} |\n",
            row.molecule,
            row.therapy_area,
            row.market_size_usd_mn,
            row.cagr_percent,
            row.generic_penetration * 100.0,
            row.competition_level,
        ));
    }

    if lower.contains("whitespace") || lower.contains("opportunity") || lower.contains("unmet") {
        let mut whitespace: Vec<&MarketRow> = rows.iter().filter(|r| r.is_whitespace()).collect();
        whitespace.sort_by(|a, b| {
            b.opportunity_score()
                .partial_cmp(&a.opportunity_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        out.push_str("\n**Whitespace Opportunities** (low competition, high patient burden):\n");
        if whitespace.is_empty() {
            out.push_str("- None found in the current dataset\n");
        }
        for row in whitespace {
            out.push_str(&format!(
                "- {} ({}): opportunity score {:.1}, competition {:.2}, burden {:.2}\n",
                row.molecule,
                row.therapy_area,
                row.opportunity_score(),
                row.competition_level,
                row.patient_burden,
            ));
        }
    }

    if lower.contains("competition") || lower.contains("competitor") || lower.contains("hhi") {
        let sizes: Vec<f64> = rows.iter().map(|r| r.market_size_usd_mn).collect();
        let index = hhi(&sizes);
        out.push_str(&format!(
            "\n**Competitive Concentration**: HHI {:.0} ({} concentration)\n",
            index,
            concentration_label(index)
        ));
        for row in rows.iter().take(3) {
            if let Some(competitors) = &row.top_competitors {
                out.push_str(&format!("- {} key players: {}\n", row.molecule, competitors));
            }
        }
    }

    if lower.contains("growth") || lower.contains("forecast") || lower.contains("projection") {
        let years = extract_years(query).unwrap_or(5);
        out.push_str(&format!("\n**Growth Projection** ({years}-year horizon):\n"));
        for row in rows.iter().take(5) {
            out.push_str(&format!(
                "- {}: {:.0} -> {:.0} USD mn at {:.1}% CAGR\n",
                row.molecule,
                row.market_size_usd_mn,
                row.projected_size(years),
                row.cagr_percent,
            ));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, memory_pool, seed_market_data};

    #[test]
    fn opportunity_score_rewards_open_markets() {
        let open = MarketRow {
            molecule: "A".into(),
            region: "Global".into(),
            therapy_area: "Oncology".into(),
            indication: None,
            market_size_usd_mn: 2000.0,
            cagr_percent: 5.0,
            top_competitors: None,
            generic_penetration: 0.1,
            patient_burden: 0.9,
            competition_level: 0.1,
        };
        let crowded = MarketRow {
            competition_level: 0.9,
            ..open.clone()
        };
        assert!(open.opportunity_score() > crowded.opportunity_score());
        assert!(open.is_whitespace());
        assert!(!crowded.is_whitespace());
    }

    #[test]
    fn hhi_bands() {
        // Monopoly: one player, share 100 -> HHI 10000.
        assert_eq!(concentration_label(hhi(&[500.0])), "High");
        // Ten equal players -> HHI 1000.
        assert_eq!(concentration_label(hhi(&[1.0; 10])), "Low");
        // Five equal players -> HHI 2000.
        assert_eq!(concentration_label(hhi(&[1.0; 5])), "Moderate");
        assert_eq!(hhi(&[]), 0.0);
    }

    #[test]
    fn projection_compounds_cagr() {
        let row = MarketRow {
            molecule: "A".into(),
            region: "Global".into(),
            therapy_area: "Diabetes".into(),
            indication: None,
            market_size_usd_mn: 1000.0,
            cagr_percent: 10.0,
            top_competitors: None,
            generic_penetration: 0.0,
            patient_burden: 0.5,
            competition_level: 0.5,
        };
        let projected = row.projected_size(2);
        assert!((projected - 1210.0).abs() < 0.01);
    }

    #[test]
    fn year_extraction() {
        assert_eq!(extract_years("forecast over 10 years"), Some(10));
        assert_eq!(extract_years("3 year outlook"), Some(3));
        assert_eq!(extract_years("forecast please"), None);
    }

    #[tokio::test]
    async fn process_renders_molecule_snapshot() {
        let pool = memory_pool().await;
        seed_market_data(&pool).await;
        let ctx = context_with(pool).await;

        let out = process("market size for metformin", &ctx).await.unwrap();
        assert!(out.contains("Metformin"));
        assert!(out.contains("3500"));
        assert!(!out.contains("Pembrolizumab"));
    }

    #[tokio::test]
    async fn whitespace_section_lists_open_markets() {
        let pool = memory_pool().await;
        seed_market_data(&pool).await;
        let ctx = context_with(pool).await;

        let out = process("whitespace opportunities in the market", &ctx)
            .await
            .unwrap();
        assert!(out.contains("Whitespace Opportunities"));
        // Metformin: competition 0.25 < 0.3, burden 0.7 > 0.5.
        assert!(out.contains("Metformin (Diabetes)"));
    }

    #[tokio::test]
    async fn empty_dataset_degrades_politely() {
        let pool = memory_pool().await;
        sqlx::query(
            "CREATE TABLE market_data (id INTEGER PRIMARY KEY, molecule TEXT, region TEXT, \
             therapy_area TEXT, indication TEXT, market_size_usd_mn REAL, cagr_percent REAL, \
             top_competitors TEXT, generic_penetration REAL, patient_burden REAL, \
             competition_level REAL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let ctx = context_with(pool).await;

        let out = process("market size overview", &ctx).await.unwrap();
        assert!(out.contains("No market data available"));
    }
}
