//! Patent agent: expiry timelines and freedom-to-operate risk over the
//! embedded patent dataset.

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::router::extract_molecule;
use crate::{AgentContext, AgentError};

/// Patents expiring within this window are generic-entry candidates.
const GENERIC_ENTRY_WINDOW_YEARS: f64 = 3.0;

/// Standard patent term assumed when reconstructing the filing date.
const PATENT_TERM_YEARS: i32 = 20;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PatentRow {
    pub molecule: String,
    pub patent_number: String,
    pub patent_type: Option<String>,
    pub expiry_date: Option<String>,
    pub status: Option<String>,
}

impl PatentRow {
    pub fn expiry(&self) -> Option<NaiveDate> {
        self.expiry_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    /// Years until expiry, rounded to one decimal. Negative means expired.
    pub fn years_until_expiry(&self) -> Option<f64> {
        let expiry = self.expiry()?;
        let days = (expiry - Utc::now().date_naive()).num_days() as f64;
        Some((days / 365.25 * 10.0).round() / 10.0)
    }

    /// Assumed filing date: expiry minus the standard 20-year term.
    pub fn assumed_filing_date(&self) -> Option<NaiveDate> {
        let expiry = self.expiry()?;
        expiry.with_year(expiry.year() - PATENT_TERM_YEARS)
    }

    pub fn is_expired(&self) -> bool {
        self.status.as_deref() == Some("expired")
            || self.years_until_expiry().map(|y| y <= 0.0).unwrap_or(false)
    }
}

/// Freedom-to-operate risk from the remaining patent life.
pub fn fto_risk(patent: &PatentRow) -> &'static str {
    if patent.is_expired() {
        return "Low";
    }
    match patent.years_until_expiry() {
        Some(years) if years > 5.0 => "High",
        Some(years) if years > 2.0 => "Moderate",
        _ => "Low",
    }
}

async fn fetch_patents(
    ctx: &AgentContext,
    molecule: Option<&str>,
) -> Result<Vec<PatentRow>, AgentError> {
    let rows = match molecule {
        Some(molecule) => {
            sqlx::query_as::<_, PatentRow>(
                "SELECT molecule, patent_number, patent_type, expiry_date, status \
                 FROM patents WHERE LOWER(molecule) = LOWER(?) ORDER BY expiry_date",
            )
            .bind(molecule)
            .fetch_all(&ctx.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, PatentRow>(
                "SELECT molecule, patent_number, patent_type, expiry_date, status \
                 FROM patents ORDER BY expiry_date",
            )
            .fetch_all(&ctx.pool)
            .await?
        }
    };
    Ok(rows)
}

/// Render the patent analysis for a query.
pub async fn process(query: &str, ctx: &AgentContext) -> Result<String, AgentError> {
    let molecule = extract_molecule(query);
    let patents = fetch_patents(ctx, molecule.as_deref()).await?;

    if patents.is_empty() {
        return Ok("### Patent Analysis\n\nNo patent records found for this query.".to_string());
    }

    let mut out = String::from("### Patent Analysis\n\n");
    out.push_str("| Molecule | Patent | Type | Expiry | Status | Years Left | FTO Risk |\n");
    out.push_str("|---|---|---|---|---|---|---|\n");
    for patent in &patents {
        let years = patent
            .years_until_expiry()
            .map(|y| format!("{y:.1}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            patent.molecule,
            patent.patent_number,
            patent.patent_type.as_deref().unwrap_or("-"),
            patent.expiry_date.as_deref().unwrap_or("-"),
            patent.status.as_deref().unwrap_or("-"),
            years,
            fto_risk(patent),
        ));
    }

    let lower = query.to_lowercase();
    if lower.contains("fto") || lower.contains("freedom to operate") {
        out.push_str("\n**Freedom to Operate**:\n");
        for patent in &patents {
            let note = match fto_risk(patent) {
                "High" => "active protection well beyond 5 years, licensing required",
                "Moderate" => "protection lapses within 5 years, plan around the cliff",
                _ => "no blocking protection remains",
            };
            out.push_str(&format!(
                "- {} ({}): {} risk, {}\n",
                patent.molecule,
                patent.patent_number,
                fto_risk(patent),
                note
            ));
        }
    }

    let entries: Vec<&PatentRow> = patents
        .iter()
        .filter(|p| {
            !p.is_expired()
                && p.years_until_expiry()
                    .map(|y| y > 0.0 && y <= GENERIC_ENTRY_WINDOW_YEARS)
                    .unwrap_or(false)
        })
        .collect();
    if !entries.is_empty() {
        out.push_str("\n**Generic Entry Opportunities** (expiry within 3 years):\n");
        for patent in entries {
            if let Some(filing) = patent.assumed_filing_date() {
                out.push_str(&format!(
                    "- {}: {} expires {}, assumed filing {}\n",
                    patent.molecule,
                    patent.patent_number,
                    patent.expiry_date.as_deref().unwrap_or("-"),
                    filing,
                ));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_with, memory_pool, seed_patents};

    fn patent(expiry: &str, status: &str) -> PatentRow {
        PatentRow {
            molecule: "Test".into(),
            patent_number: "US0000000".into(),
            patent_type: Some("composition".into()),
            expiry_date: Some(expiry.into()),
            status: Some(status.into()),
        }
    }

    fn date_in_years(years: f64) -> String {
        let days = (years * 365.25) as i64;
        (Utc::now().date_naive() + chrono::Duration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }

    #[test]
    fn expired_patent_is_low_risk() {
        let p = patent("2000-06-04", "expired");
        assert!(p.is_expired());
        assert_eq!(fto_risk(&p), "Low");
    }

    #[test]
    fn long_protection_is_high_risk() {
        let p = patent(&date_in_years(8.0), "active");
        assert_eq!(fto_risk(&p), "High");
    }

    #[test]
    fn mid_window_is_moderate_risk() {
        let p = patent(&date_in_years(3.5), "active");
        assert_eq!(fto_risk(&p), "Moderate");
    }

    #[test]
    fn near_expiry_is_low_risk() {
        let p = patent(&date_in_years(1.0), "active");
        assert_eq!(fto_risk(&p), "Low");
    }

    #[test]
    fn filing_date_is_twenty_years_before_expiry() {
        let p = patent("2027-04-15", "active");
        assert_eq!(
            p.assumed_filing_date(),
            NaiveDate::from_ymd_opt(2007, 4, 15)
        );
    }

    #[test]
    fn years_until_expiry_rounds_to_tenths() {
        let p = patent(&date_in_years(2.0), "active");
        let years = p.years_until_expiry().unwrap();
        assert!((years - 2.0).abs() <= 0.1);
        // One decimal place only.
        assert_eq!(years, (years * 10.0).round() / 10.0);
    }

    #[test]
    fn unparseable_expiry_is_none() {
        let p = patent("soon", "active");
        assert!(p.expiry().is_none());
        assert!(p.years_until_expiry().is_none());
    }

    #[tokio::test]
    async fn process_filters_by_molecule() {
        let pool = memory_pool().await;
        seed_patents(&pool).await;
        let ctx = context_with(pool).await;

        let out = process("patent status for sitagliptin", &ctx).await.unwrap();
        assert!(out.contains("US7128924"));
        assert!(!out.contains("US7659253"));
    }

    #[tokio::test]
    async fn fto_section_appears_on_request() {
        let pool = memory_pool().await;
        seed_patents(&pool).await;
        let ctx = context_with(pool).await;

        let out = process("freedom to operate for metformin", &ctx)
            .await
            .unwrap();
        assert!(out.contains("Freedom to Operate"));
        assert!(out.contains("Low risk"));
    }
}
