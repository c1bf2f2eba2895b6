//! Present resolver: turns an instruction grid into ordered evaluation steps.

use serde::{Deserialize, Serialize};

use crate::{Grid, ModelId};

/// Header rows at the top of every present tab.
pub const PRESENT_HEADER_ROWS: usize = 2;

/// Rows with fewer cells than this are not steps.
const MIN_STEP_COLUMNS: usize = 6;

/// How a step derives its prompt from the previous step's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// Use the step's own prompt.
    Raw,
    /// Use the single output of the previous step.
    PriorSingleOutput,
    /// Use every output of the previous step, labelled by model.
    PriorAllOutputs,
}

impl InputType {
    /// Parses an input-type cell.
    ///
    /// Accepts the canonical names and the tokens used by existing templates.
    /// Anything else is treated as [`InputType::Raw`].
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "prior_single_output" | "prior_model_output_only" => Self::PriorSingleOutput,
            "prior_all_outputs" | "prior_all_models_output" => Self::PriorAllOutputs,
            _ => Self::Raw,
        }
    }
}

/// One stage of a [`Present`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentStep {
    pub number: String,
    pub description: String,
    pub input_type: InputType,
    pub prompt: String,
    /// Models to invoke, in sheet order. May be empty for a malformed row.
    pub active_models: Vec<ModelId>,
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Present {
    pub name: String,
    pub steps: Vec<PresentStep>,
}

impl Present {
    pub fn from_grid(name: impl Into<String>, grid: &Grid) -> Self {
        Self {
            name: name.into(),
            steps: parse_present(grid),
        }
    }
}

/// Parses a present grid into its steps, in row order.
///
/// Columns B..F hold number, description, input type, prompt and the
/// comma-separated model list. Values are trimmed but otherwise unvalidated.
pub fn parse_present(grid: &Grid) -> Vec<PresentStep> {
    grid.iter()
        .skip(PRESENT_HEADER_ROWS)
        .filter(|row| row.len() >= MIN_STEP_COLUMNS)
        .map(|row| PresentStep {
            number: row[1].trim().to_string(),
            description: row[2].trim().to_string(),
            input_type: InputType::parse(&row[3]),
            prompt: row[4].trim().to_string(),
            active_models: row[5].split(',').filter_map(|m| ModelId::new(m.trim())).collect(),
        })
        .collect()
}
