//! EXIM agent: import/export trade intelligence from a literal dataset.
//!
//! Stands in for a trade data vendor. Values are hand-written per
//! molecule; the analysis layer is dependency-risk banding and volume
//! projection arithmetic.

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;

use crate::router::extract_molecule;
use crate::{AgentContext, AgentError};

/// One sourcing country for an API import.
#[derive(Debug, Clone)]
pub struct TradeSource {
    pub country: &'static str,
    pub volume_kg: f64,
    pub percentage: f64,
    pub price_per_kg: f64,
}

/// Import picture for one molecule's API.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub molecule: &'static str,
    pub total_volume_kg: f64,
    pub average_price_per_kg: f64,
    pub yoy_growth: f64,
    pub price_trend: &'static str,
    pub sources: Vec<TradeSource>,
}

static TRADE_DATA: Lazy<Vec<TradeRecord>> = Lazy::new(|| {
    vec![
        TradeRecord {
            molecule: "metformin",
            total_volume_kg: 125_000.0,
            average_price_per_kg: 45.50,
            yoy_growth: 5.2,
            price_trend: "stable",
            sources: vec![
                TradeSource { country: "China", volume_kg: 80_000.0, percentage: 64.0, price_per_kg: 42.00 },
                TradeSource { country: "India", volume_kg: 35_000.0, percentage: 28.0, price_per_kg: 48.00 },
                TradeSource { country: "Germany", volume_kg: 10_000.0, percentage: 8.0, price_per_kg: 52.00 },
            ],
        },
        TradeRecord {
            molecule: "sitagliptin",
            total_volume_kg: 8_500.0,
            average_price_per_kg: 1250.00,
            yoy_growth: -2.3,
            price_trend: "declining",
            sources: vec![
                TradeSource { country: "China", volume_kg: 5_000.0, percentage: 59.0, price_per_kg: 1200.00 },
                TradeSource { country: "India", volume_kg: 2_500.0, percentage: 29.0, price_per_kg: 1300.00 },
                TradeSource { country: "Italy", volume_kg: 1_000.0, percentage: 12.0, price_per_kg: 1350.00 },
            ],
        },
        TradeRecord {
            molecule: "rivaroxaban",
            total_volume_kg: 12_000.0,
            average_price_per_kg: 850.00,
            yoy_growth: 8.1,
            price_trend: "increasing",
            sources: vec![
                TradeSource { country: "China", volume_kg: 7_000.0, percentage: 58.0, price_per_kg: 820.00 },
                TradeSource { country: "Germany", volume_kg: 3_000.0, percentage: 25.0, price_per_kg: 900.00 },
                TradeSource { country: "India", volume_kg: 2_000.0, percentage: 17.0, price_per_kg: 880.00 },
            ],
        },
    ]
});

pub fn trade_record(molecule: &str) -> Option<&'static TradeRecord> {
    let lower = molecule.to_lowercase();
    TRADE_DATA.iter().find(|r| r.molecule == lower)
}

/// Single-source dependency banding over the top supplier's share.
pub fn dependency_risk(top_share: f64) -> &'static str {
    if top_share > 70.0 {
        "High"
    } else if top_share > 50.0 {
        "Moderate"
    } else {
        "Low"
    }
}

/// Projected import volume after `years` at the current YoY growth rate.
pub fn projected_volume(record: &TradeRecord, years: u32) -> f64 {
    record.total_volume_kg * (1.0 + record.yoy_growth / 100.0).powi(years as i32)
}

fn recommendations(record: &TradeRecord) -> Vec<&'static str> {
    let mut recs = Vec::new();
    let top = &record.sources[0];
    if top.percentage > 70.0 {
        recs.push("High dependency on a single source. Consider diversifying suppliers.");
    }
    if record.price_trend == "increasing" {
        recs.push("Price trend is increasing. Consider long-term supply contracts.");
    }
    if record.sources.len() < 3 {
        recs.push("Limited supplier base. Explore additional sourcing options.");
    }
    recs
}

/// Render the trade analysis for a query.
pub async fn process(query: &str, _ctx: &AgentContext) -> Result<String, AgentError> {
    let molecule = extract_molecule(query).unwrap_or_else(|| "metformin".to_string());

    let Some(record) = trade_record(&molecule) else {
        return Ok(format!(
            "### Trade Analysis\n\nNo import/export data available for {molecule}."
        ));
    };

    let mut out = String::from("### Trade Analysis\n\n");
    out.push_str(&format!(
        "**{} API imports**: {:.0} kg/year at ${:.2}/kg average ({} price trend, {:+.1}% YoY)\n\n",
        capitalize(record.molecule),
        record.total_volume_kg,
        record.average_price_per_kg,
        record.price_trend,
        record.yoy_growth,
    ));

    out.push_str("| Source | Volume (kg) | Share | Price/kg |\n|---|---|---|---|\n");
    for source in &record.sources {
        out.push_str(&format!(
            "| {} | {:.0} | {:.0}% | ${:.2} |\n",
            source.country, source.volume_kg, source.percentage, source.price_per_kg
        ));
    }

    let top = &record.sources[0];
    out.push_str(&format!(
        "\n**Import Dependency**: {} risk ({} holds {:.0}% of supply, diversification score {:.0})\n",
        dependency_risk(top.percentage),
        top.country,
        top.percentage,
        100.0 - top.percentage,
    ));

    for rec in recommendations(record) {
        out.push_str(&format!("- {rec}\n"));
    }

    let lower = query.to_lowercase();
    if lower.contains("trend") || lower.contains("projection") || lower.contains("forecast") {
        let current_year = Utc::now().year();
        out.push_str("\n**Volume Projection**:\n");
        for year in 1..=5u32 {
            out.push_str(&format!(
                "- {}: {:.0} kg\n",
                current_year + year as i32,
                projected_volume(record, year),
            ));
        }
    }

    Ok(out)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
