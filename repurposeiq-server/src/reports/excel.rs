//! Excel rendering with one sheet per report section.

use std::path::Path;

use chrono::Utc;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use super::{ReportError, ReportInput, Result};

const ANSWER_COLUMN_WIDTH: f64 = 100.0;

fn xlsx(e: XlsxError) -> ReportError {
    ReportError::Xlsx(e.to_string())
}

fn write_answer(sheet: &mut Worksheet, answer: &str, heading: &Format) -> Result<()> {
    let mut row = 0u32;
    for line in answer.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            row += 1;
            continue;
        }
        if let Some(text) = line.strip_prefix("## ").or_else(|| line.strip_prefix("# ")) {
            sheet.write_with_format(row, 0, text, heading).map_err(xlsx)?;
        } else {
            sheet.write(row, 0, line).map_err(xlsx)?;
        }
        row += 1;
    }
    Ok(())
}

pub fn render(path: &Path, input: &ReportInput<'_>) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let summary = workbook.add_worksheet();
    summary.set_name("Summary").map_err(xlsx)?;
    summary.set_column_width(0, 24.0).map_err(xlsx)?;
    summary.set_column_width(1, ANSWER_COLUMN_WIDTH).map_err(xlsx)?;
    summary.write_with_format(0, 0, "RepurposeIQ Report", &bold).map_err(xlsx)?;
    summary
        .write(1, 0, format!("Generated {}", Utc::now().format("%Y-%m-%d %H:%M UTC")))
        .map_err(xlsx)?;
    summary.write_with_format(3, 0, "Query", &bold).map_err(xlsx)?;
    summary.write(3, 1, input.query).map_err(xlsx)?;
    summary.write_with_format(4, 0, "Requested by", &bold).map_err(xlsx)?;
    summary.write(4, 1, input.generated_by).map_err(xlsx)?;
    summary.write_with_format(5, 0, "Intent", &bold).map_err(xlsx)?;
    summary
        .write(5, 1, input.response.intent.as_str())
        .map_err(xlsx)?;
    summary.write_with_format(6, 0, "Agents", &bold).map_err(xlsx)?;
    summary
        .write(6, 1, input.response.agents_used.join(", "))
        .map_err(xlsx)?;
    summary.write_with_format(7, 0, "Response time (ms)", &bold).map_err(xlsx)?;
    summary
        .write(7, 1, input.response.response_time_ms as f64)
        .map_err(xlsx)?;

    let answer = workbook.add_worksheet();
    answer.set_name("Analysis").map_err(xlsx)?;
    answer.set_column_width(0, ANSWER_COLUMN_WIDTH).map_err(xlsx)?;
    write_answer(answer, &input.response.answer, &bold)?;

    let agents = workbook.add_worksheet();
    agents.set_name("Agent Outputs").map_err(xlsx)?;
    agents.set_column_width(0, 16.0).map_err(xlsx)?;
    agents.set_column_width(1, ANSWER_COLUMN_WIDTH).map_err(xlsx)?;
    agents.write_with_format(0, 0, "Agent", &bold).map_err(xlsx)?;
    agents.write_with_format(0, 1, "Output", &bold).map_err(xlsx)?;
    for (i, (name, output)) in input.response.agent_outputs.iter().enumerate() {
        let row = (i + 1) as u32;
        agents.write(row, 0, name).map_err(xlsx)?;
        agents.write(row, 1, output).map_err(xlsx)?;
    }

    let reasoning = workbook.add_worksheet();
    reasoning.set_name("Strategic Reasoning").map_err(xlsx)?;
    reasoning.set_column_width(0, 24.0).map_err(xlsx)?;
    reasoning.set_column_width(1, ANSWER_COLUMN_WIDTH).map_err(xlsx)?;
    reasoning.write_with_format(0, 0, "Reasoning", &bold).map_err(xlsx)?;
    reasoning
        .write(0, 1, &input.response.strategic_reasoning.reasoning)
        .map_err(xlsx)?;
    reasoning.write_with_format(1, 0, "Confidence", &bold).map_err(xlsx)?;
    reasoning
        .write(1, 1, input.response.strategic_reasoning.confidence_score)
        .map_err(xlsx)?;
    reasoning.write_with_format(2, 0, "Decision Factors", &bold).map_err(xlsx)?;
    for (i, factor) in input
        .response
        .strategic_reasoning
        .decision_factors
        .iter()
        .enumerate()
    {
        reasoning.write(2 + i as u32, 1, factor).map_err(xlsx)?;
    }

    workbook.save(path).map_err(xlsx)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_writes_a_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report_test.xlsx");
        let response = crate::reports::tests::sample_response();
        render(
            &path,
            &ReportInput {
                query: "metformin outlook",
                response: &response,
                generated_by: "analyst",
            },
        )
        .unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }
}
