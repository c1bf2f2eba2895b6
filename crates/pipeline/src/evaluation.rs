//! Evaluation pipeline: runs a present's steps against the configured models.
//!
//! Steps run strictly in order; model invocations run one at a time. Each
//! step's result becomes the prior context of the next step that runs. A
//! failing model invocation is recorded as an error marker under that model's
//! key and never aborts the step or the pipeline.
//!
//! The pipeline is used in two modes:
//!
//! - **Question evaluation**: no attachments, the question text as context.
//! - **Upload ingestion**: attachments, no context; the final step must
//!   produce exactly one structured output ([`parse_final_output`]).

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ports::{Attachment, ModelRequest, ModelService};
use crate::present::{InputType, PresentStep};
use crate::{ModelKey, StepResult};

#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A `prior_single_output` step followed a step with several outputs.
    #[error("step {step} expects a single prior output but the previous step produced {count}")]
    AmbiguousPriorOutput { step: String, count: usize },

    /// Ingestion produced no step results at all.
    #[error("the present produced no results")]
    NoResults,

    /// The final ingestion step must come from exactly one model.
    #[error("final output must come from exactly one model, found {count}")]
    AmbiguousFinalOutput { count: usize },
}

// ---------------------------------------------------------------------------
// Prior context
// ---------------------------------------------------------------------------

/// What a step takes from the step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorContext<'a> {
    /// The one output of the previous step.
    Single(&'a str),
    /// Every output of the previous step.
    All(&'a StepResult),
}

impl<'a> PriorContext<'a> {
    /// Selects the prior context a step of `input_type` uses.
    ///
    /// `None` means the step falls back to its own prompt: it is a `raw` step,
    /// or there is no previous result to draw from.
    pub fn select(
        step: &PresentStep,
        previous: Option<&'a StepResult>,
    ) -> Result<Option<Self>, EvaluationError> {
        let Some(previous) = previous.filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        match step.input_type {
            InputType::Raw => Ok(None),
            InputType::PriorSingleOutput => {
                if previous.len() > 1 {
                    return Err(EvaluationError::AmbiguousPriorOutput {
                        step: step.number.clone(),
                        count: previous.len(),
                    });
                }
                Ok(previous.iter().next().map(|(_, output)| Self::Single(output)))
            }
            InputType::PriorAllOutputs => Ok(Some(Self::All(previous))),
        }
    }

    /// Renders the context as prompt text.
    ///
    /// All outputs are written as `MODEL: output` entries separated by blank
    /// lines, in model-key order.
    pub fn render(&self) -> String {
        match self {
            Self::Single(output) => (*output).to_string(),
            Self::All(result) => result
                .iter()
                .map(|(model, output)| format!("{model}: {output}"))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// The prompt a step sends, given the previous step's result.
pub fn effective_prompt(
    step: &PresentStep,
    previous: Option<&StepResult>,
) -> Result<String, EvaluationError> {
    Ok(match PriorContext::select(step, previous)? {
        Some(prior) => prior.render(),
        None => step.prompt.clone(),
    })
}

// ---------------------------------------------------------------------------
// Error markers
// ---------------------------------------------------------------------------

const MARKER_PREFIX: &str = "[Error: ";

/// The text recorded in place of a failed model's output.
pub fn error_marker(error: &dyn std::fmt::Display) -> String {
    format!("{MARKER_PREFIX}{error}]")
}

/// Returns `true` for text produced by [`error_marker`].
pub fn is_error_marker(text: &str) -> bool {
    text.starts_with(MARKER_PREFIX) && text.ends_with(']')
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Runs `steps` in order and returns one [`StepResult`] per step that ran.
///
/// Steps without active models are skipped and produce no result. Two models
/// of the same family in one step share a key; the later one wins.
pub async fn evaluate(
    steps: &[PresentStep],
    context: Option<&str>,
    attachments: &[Attachment],
    models: &dyn ModelService,
) -> Result<Vec<StepResult>, EvaluationError> {
    let mut results: Vec<StepResult> = Vec::new();

    for step in steps {
        if step.active_models.is_empty() {
            debug!(step = %step.number, "step has no active models, skipping");
            continue;
        }

        let prompt = effective_prompt(step, results.last())?;
        let mut result = StepResult::new();
        for model in &step.active_models {
            let request = ModelRequest {
                model,
                prompt: &prompt,
                context,
                attachments,
            };
            let output = match models.invoke(request).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(step = %step.number, model = %model, error = %e, "model invocation failed");
                    error_marker(&e)
                }
            };
            result.insert(ModelKey::canonicalize(model), output);
        }

        debug!(step = %step.number, outputs = result.len(), "step complete");
        results.push(result);
    }

    Ok(results)
}

// ---------------------------------------------------------------------------
// Final output
// ---------------------------------------------------------------------------

/// The structured output of an ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalOutput {
    /// The model produced valid JSON; `text` is kept verbatim.
    Structured { text: String, value: Value },
    /// The model produced something else, wrapped as `{"output": text}`.
    Wrapped(Value),
}

impl FinalOutput {
    pub fn value(&self) -> &Value {
        match self {
            Self::Structured { value, .. } | Self::Wrapped(value) => value,
        }
    }

    /// The JSON text to persist.
    pub fn to_json_text(&self) -> String {
        match self {
            Self::Structured { text, .. } => text.clone(),
            Self::Wrapped(value) => value.to_string(),
        }
    }
}

/// Extracts the structured output from the last step of an ingestion run.
pub fn parse_final_output(results: &[StepResult]) -> Result<FinalOutput, EvaluationError> {
    let last = results.last().ok_or(EvaluationError::NoResults)?;
    let mut entries = last.iter();
    let (Some((_, text)), None) = (entries.next(), entries.next()) else {
        return Err(EvaluationError::AmbiguousFinalOutput { count: last.len() });
    };

    let text = strip_code_fence(text);
    Ok(match serde_json::from_str::<Value>(text) {
        Ok(value) => FinalOutput::Structured {
            text: text.to_string(),
            value,
        },
        Err(_) => FinalOutput::Wrapped(json!({ "output": text })),
    })
}

/// Removes a surrounding Markdown code fence (```` ```json ```` or ```` ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}
