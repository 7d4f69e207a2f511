//! Workflow step definitions.
//!
//! Steps are stored as a JSON array in the workflows table and
//! interpreted by the scheduler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::repos::workflows::WorkflowRow;

/// One executable workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Run a free-text query through the full agent pipeline.
    Query { query: String },
    /// Run the market agent directly for a molecule.
    MarketAnalysis { molecule: String },
    /// Run the patent agent directly for a molecule.
    PatentCheck { molecule: String },
    /// Run the clinical agent directly for a drug.
    ClinicalTrialSearch { drug: String },
    /// Pause between steps.
    Wait { seconds: u64 },
    /// Branch on the previous step's output.
    Condition {
        condition: StepCondition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        then: Option<Box<WorkflowStep>>,
        #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<WorkflowStep>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StepCondition {
    pub operator: ConditionOperator,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    GreaterThan,
    Contains,
}

impl StepCondition {
    /// Evaluate against the previous step's text output.
    ///
    /// `greater_than` compares the first number found in the output
    /// against a numeric value; the other operators work on text.
    pub fn evaluate(&self, previous_output: &str) -> bool {
        match self.operator {
            ConditionOperator::Equals => self
                .value
                .as_str()
                .map(|v| previous_output.trim() == v)
                .unwrap_or(false),
            ConditionOperator::Contains => self
                .value
                .as_str()
                .map(|v| previous_output.to_lowercase().contains(&v.to_lowercase()))
                .unwrap_or(false),
            ConditionOperator::GreaterThan => match (first_number(previous_output), self.value.as_f64()) {
                (Some(found), Some(threshold)) => found > threshold,
                _ => false,
            },
        }
    }
}

fn first_number(text: &str) -> Option<f64> {
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || (c == '.' && !current.is_empty()) {
            current.push(c);
        } else if !current.is_empty() {
            break;
        }
    }
    current.parse().ok()
}

/// Client-facing workflow shape with parsed steps.
#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    pub schedule: Option<String>,
    pub enabled: bool,
    pub status: String,
    pub last_run: Option<chrono::DateTime<chrono::Utc>>,
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
    pub run_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = serde_json::Error;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            steps: serde_json::from_str(&row.steps)?,
            schedule: row.schedule,
            enabled: row.enabled != 0,
            status: row.status,
            last_run: row.last_run,
            next_run: row.next_run,
            run_count: row.run_count,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn steps_round_trip_through_tagged_json() {
        let raw = r#"[
            {"type":"query","query":"metformin market size"},
            {"type":"market_analysis","molecule":"metformin"},
            {"type":"wait","seconds":30},
            {"type":"condition",
             "condition":{"operator":"contains","value":"whitespace"},
             "then":{"type":"patent_check","molecule":"metformin"}}
        ]"#;

        let steps: Vec<WorkflowStep> = serde_json::from_str(raw).unwrap();
        assert_eq!(steps.len(), 4);
        assert!(matches!(&steps[2], WorkflowStep::Wait { seconds: 30 }));
        match &steps[3] {
            WorkflowStep::Condition { then, otherwise, .. } => {
                assert!(then.is_some());
                assert!(otherwise.is_none());
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn condition_operators() {
        let contains = StepCondition {
            operator: ConditionOperator::Contains,
            value: json!("Whitespace"),
        };
        assert!(contains.evaluate("found a whitespace opportunity"));
        assert!(!contains.evaluate("nothing here"));

        let equals = StepCondition {
            operator: ConditionOperator::Equals,
            value: json!("done"),
        };
        assert!(equals.evaluate("  done "));

        let greater = StepCondition {
            operator: ConditionOperator::GreaterThan,
            value: json!(1000),
        };
        assert!(greater.evaluate("market size is 3500 million"));
        assert!(!greater.evaluate("market size is 800 million"));
        assert!(!greater.evaluate("no numbers"));
    }
}
