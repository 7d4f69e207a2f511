//! Clinical agent: trial lookups and repurposing opportunity scoring
//! over the embedded trial dataset.

use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::router::extract_molecule;
use crate::{AgentContext, AgentError};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrialRow {
    pub nct_id: String,
    pub indication: Option<String>,
    pub therapy_area: Option<String>,
    pub phase: Option<String>,
    pub drug_name: Option<String>,
    pub sponsor: Option<String>,
    pub patient_burden_score: f64,
    pub competition_density: f64,
    pub unmet_need: f64,
}

impl TrialRow {
    /// Repurposing opportunity score on a 0-100 scale.
    ///
    /// Weights: unmet need 0.4, patient burden 0.3, open field 0.3.
    pub fn opportunity_score(&self) -> f64 {
        (self.unmet_need * 0.4
            + self.patient_burden_score * 0.3
            + (1.0 - self.competition_density) * 0.3)
            * 100.0
    }
}

async fn fetch_trials(
    ctx: &AgentContext,
    molecule: Option<&str>,
) -> Result<Vec<TrialRow>, AgentError> {
    let rows = match molecule {
        Some(molecule) => {
            sqlx::query_as::<_, TrialRow>(
                "SELECT nct_id, indication, therapy_area, phase, drug_name, sponsor, \
                 patient_burden_score, competition_density, unmet_need \
                 FROM clinical_trials WHERE LOWER(drug_name) LIKE LOWER(?) ORDER BY nct_id",
            )
            .bind(format!("%{molecule}%"))
            .fetch_all(&ctx.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, TrialRow>(
                "SELECT nct_id, indication, therapy_area, phase, drug_name, sponsor, \
                 patient_burden_score, competition_density, unmet_need \
                 FROM clinical_trials ORDER BY nct_id",
            )
            .fetch_all(&ctx.pool)
            .await?
        }
    };
    Ok(rows)
}

/// Render the clinical analysis for a query.
pub async fn process(query: &str, ctx: &AgentContext) -> Result<String, AgentError> {
    let molecule = extract_molecule(query);
    let trials = fetch_trials(ctx, molecule.as_deref()).await?;

    if trials.is_empty() {
        return Ok(
            "### Clinical Analysis\n\nNo registered trials found for this query.".to_string(),
        );
    }

    let mut out = String::from("### Clinical Analysis\n\n");
    out.push_str("| NCT ID | Drug | Indication | Phase | Sponsor | Opportunity |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for trial in &trials {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.0} |\n",
            trial.nct_id,
            trial.drug_name.as_deref().unwrap_or("-"),
            trial.indication.as_deref().unwrap_or("-"),
            trial.phase.as_deref().unwrap_or("-"),
            trial.sponsor.as_deref().unwrap_or("-"),
            trial.opportunity_score(),
        ));
    }

    let lower = query.to_lowercase();
    if lower.contains("repurpos") || lower.contains("opportunity") || lower.contains("unmet") {
        let mut ranked: Vec<&TrialRow> = trials.iter().collect();
        ranked.sort_by(|a, b| {
            b.opportunity_score()
                .partial_cmp(&a.opportunity_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        out.push_str("\n**Repurposing Opportunities** (by opportunity score):\n");
        for trial in ranked.iter().take(5) {
            out.push_str(&format!(
                "- {} for {}: score {:.0} (unmet need {:.2}, burden {:.2}, competition {:.2})\n",
                trial.drug_name.as_deref().unwrap_or("unknown"),
                trial.indication.as_deref().unwrap_or("unknown"),
                trial.opportunity_score(),
                trial.unmet_need,
                trial.patient_burden_score,
                trial.competition_density,
            ));
        }
    }

    if lower.contains("phase") || lower.contains("pipeline") {
        let mut by_phase: BTreeMap<String, usize> = BTreeMap::new();
        for trial in &trials {
            let phase = trial.phase.clone().unwrap_or_else(|| "Unknown".to_string());
            *by_phase.entry(phase).or_insert(0) += 1;
        }
        out.push_str("\n**Pipeline by Phase**:\n");
        for (phase, count) in by_phase {
            out.push_str(&format!("- {phase}: {count} trial(s)\n"));
        }
    }

    if lower.contains("indication") || lower.contains("disease") {
        // Top indications by average unmet need.
        let mut grouped: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for trial in &trials {
            let indication = trial
                .indication
                .clone()
                .unwrap_or_else(|| "Unknown".to_string());
            let entry = grouped.entry(indication).or_insert((0.0, 0));
            entry.0 += trial.unmet_need;
            entry.1 += 1;
        }
        let mut averaged: Vec<(String, f64)> = grouped
            .into_iter()
            .map(|(indication, (sum, count))| (indication, sum / count as f64))
            .collect();
        averaged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        out.push_str("\n**Top Indications by Unmet Need**:\n");
        for (indication, avg) in averaged.into_iter().take(5) {
            out.push_str(&format!("- {indication}: average unmet need {avg:.2}\n"));
        }
    }

    Ok(out)
}
