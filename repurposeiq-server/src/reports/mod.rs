//! Report generation and file bookkeeping.
//!
//! Reports land in the configured reports directory as
//! `report_<unix_millis>.pdf` or `.xlsx`.

pub mod excel;
pub mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use repurposeiq_agents::master::MasterResponse;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("spreadsheet error: {0}")]
    Xlsx(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Everything a generated report carries besides the answer itself.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub query: &'a str,
    pub response: &'a MasterResponse,
    pub generated_by: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportFile {
    pub filename: String,
    pub size_bytes: u64,
    pub created_at: String,
}

fn report_filename(extension: &str) -> String {
    format!("report_{}.{}", Utc::now().timestamp_millis(), extension)
}

/// Generate a PDF report, returning its filename.
pub fn generate_pdf(dir: &Path, input: &ReportInput<'_>) -> Result<String> {
    fs::create_dir_all(dir)?;
    let filename = report_filename("pdf");
    pdf::render(&dir.join(&filename), input)?;
    Ok(filename)
}

/// Generate an Excel report, returning its filename.
pub fn generate_excel(dir: &Path, input: &ReportInput<'_>) -> Result<String> {
    fs::create_dir_all(dir)?;
    let filename = report_filename("xlsx");
    excel::render(&dir.join(&filename), input)?;
    Ok(filename)
}

/// List generated reports, newest first.
pub fn list_reports(dir: &Path) -> Result<Vec<ReportFile>> {
    let mut files = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("report_") {
            continue;
        }
        let meta = entry.metadata()?;
        let created = meta
            .modified()
            .map(chrono::DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        files.push(ReportFile {
            filename: name,
            size_bytes: meta.len(),
            created_at: created.to_rfc3339(),
        });
    }

    files.sort_by(|a, b| b.filename.cmp(&a.filename));
    Ok(files)
}

/// Resolve a report filename to a path, rejecting traversal attempts.
pub fn resolve_download(dir: &Path, filename: &str) -> Option<PathBuf> {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return None;
    }
    if !filename.starts_with("report_") {
        return None;
    }
    let path = dir.join(filename);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repurposeiq_agents::master::StrategicReasoning;
    use std::collections::BTreeMap;

    pub(crate) fn sample_response() -> MasterResponse {
        let mut agent_outputs = BTreeMap::new();
        agent_outputs.insert(
            "MARKET".to_string(),
            "## Market Snapshot\nMetformin: $3.5B, 5.2% CAGR".to_string(),
        );
        agent_outputs.insert(
            "PATENT".to_string(),
            "## Patent Landscape\nUS4522811 expired".to_string(),
        );
        MasterResponse {
            answer: "## Summary\nMetformin shows repurposing potential.\n\n## Detail\nLow FTO risk."
                .to_string(),
            intent: repurposeiq_agents::Intent::MarketAnalysis,
            agents_used: vec!["MARKET".into(), "PATENT".into()],
            agent_outputs,
            routing_reasoning: vec!["Market terms detected".into()],
            strategic_reasoning: StrategicReasoning {
                reasoning: "Combined market and patent signals".into(),
                confidence_score: 0.85,
                decision_factors: vec!["internal market database".into()],
            },
            chart_data: None,
            response_time_ms: 1200,
            demo_mode: false,
            rejected: false,
        }
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = std::env::temp_dir();
        assert!(resolve_download(&dir, "../etc/passwd").is_none());
        assert!(resolve_download(&dir, "report_/x.pdf").is_none());
        assert!(resolve_download(&dir, "notes.txt").is_none());
    }

    #[test]
    fn pdf_and_excel_reports_are_written_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let response = sample_response();
        let input = ReportInput {
            query: "metformin repurposing outlook",
            response: &response,
            generated_by: "analyst",
        };

        let pdf_name = generate_pdf(dir.path(), &input).unwrap();
        let xlsx_name = generate_excel(dir.path(), &input).unwrap();
        assert!(pdf_name.ends_with(".pdf"));
        assert!(xlsx_name.ends_with(".xlsx"));

        let listed = list_reports(dir.path()).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|f| f.size_bytes > 0));

        assert!(resolve_download(dir.path(), &pdf_name).is_some());
    }
}
