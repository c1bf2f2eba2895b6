//! Ledger codec: sheet rows to [`Question`] records and back.
//!
//! ## Layout
//!
//! Rows 1 and 2 are headers. From row 3 each row is one question:
//!
//! | Column | Content |
//! |--------|---------|
//! | B | question number |
//! | C | question text |
//! | D | present name |
//! | E | reload flag (`X` or blank) |
//! | F | resolved flag (`X` or blank) |
//! | G.. | one group of four cells per step, in [`ModelKey::LEDGER_ORDER`] |
//!
//! A question's row is addressed by its number: row = number + [`HEADER_ROWS`].
//!
//! ## Step width
//!
//! Decoding is dense: every step group the header width implies is read, blank
//! or not. Encoding is dense up to the last step that produced any output, so a
//! blank step in the middle is written back as four blank cells and never
//! shifts the groups after it. Only trailing blank steps are left out.
//! Results keyed by a model outside the four ledger families are kept in the
//! checkpoint but have no ledger column.

use serde_json::Value;

use crate::grid::{CellAddress, CellRange};
use crate::{Grid, ModelKey, Question, QuestionNumber, StepResult};

/// Header rows above the first question row.
pub const HEADER_ROWS: usize = 2;

/// Columns per step group.
pub const STEP_WIDTH: usize = 4;

const NUMBER_COL: usize = 1; // B
const TEXT_COL: usize = 2;
const PRESENT_COL: usize = 3;
const RELOAD_COL: usize = 4;
const RESOLVED_COL: usize = 5;
const FIRST_STEP_COL: usize = 6; // G

const FLAG: &str = "X";

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes every question row of a ledger grid, in sheet order.
pub fn decode_ledger(grid: &Grid) -> Vec<Question> {
    let steps = step_count(grid);
    grid.iter()
        .skip(HEADER_ROWS)
        .map(|row| decode_row(row, steps))
        .collect()
}

/// Number of step groups implied by the second header row, the one that
/// names the model of every output column.
pub fn step_count(grid: &Grid) -> usize {
    let width = grid.get(HEADER_ROWS - 1).map_or(0, Vec::len);
    width.saturating_sub(FIRST_STEP_COL) / STEP_WIDTH
}

fn decode_row(row: &[String], steps: usize) -> Question {
    let cell = |col: usize| row.get(col).map(String::as_str).unwrap_or("");

    let model_outputs = (0..steps)
        .map(|step| {
            let base = FIRST_STEP_COL + step * STEP_WIDTH;
            ModelKey::LEDGER_ORDER
                .iter()
                .enumerate()
                .map(|(offset, key)| (key.clone(), cell(base + offset).trim().to_string()))
                .collect::<StepResult>()
        })
        .collect();

    Question {
        question_number: QuestionNumber::from_cell(cell(NUMBER_COL)),
        text: cell(TEXT_COL).trim().to_string(),
        present_name: cell(PRESENT_COL).trim().to_string(),
        reload_requested: is_flag_set(cell(RELOAD_COL)),
        resolved: is_flag_set(cell(RESOLVED_COL)),
        model_outputs,
    }
}

/// A flag cell is set when it reads `X`, ignoring case and any whitespace
/// (non-breaking spaces included).
pub fn is_flag_set(cell: &str) -> bool {
    // `trim` covers U+00A0, which the sheet UI inserts on paste.
    cell.trim().eq_ignore_ascii_case(FLAG)
}

/// The number to give the next appended question: one past the highest number
/// in column B, or `1` for an empty ledger.
pub fn next_question_number(grid: &Grid) -> QuestionNumber {
    let highest = grid
        .iter()
        .skip(HEADER_ROWS)
        .filter_map(|row| row.get(NUMBER_COL))
        .map(|cell| QuestionNumber::from_cell(cell).as_u64())
        .max()
        .unwrap_or(0);
    QuestionNumber::new(highest.saturating_add(1))
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// A block of values destined for one ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub range: CellRange,
    pub values: Vec<String>,
}

/// The first cell (column B) of the row that holds `number`.
///
/// `None` for the unassigned number `0` and for numbers past the last row a
/// sheet can address.
pub fn row_anchor(number: QuestionNumber) -> Option<CellAddress> {
    if number.is_unassigned() {
        return None;
    }
    let row = number.as_u64().checked_add(HEADER_ROWS as u64)?;
    let row = u32::try_from(row).ok()?;
    CellAddress::new(row, NUMBER_COL as u32 + 1)
}

/// Encodes one question as its ledger row.
///
/// Returns `None` when the question has no addressable row.
pub fn encode_question(question: &Question) -> Option<LedgerRow> {
    let anchor = row_anchor(question.question_number)?;

    let mut values = vec![
        question.question_number.to_string(),
        question.text.clone(),
        question.present_name.clone(),
        flag_cell(question.reload_requested),
        flag_cell(question.resolved),
    ];

    let written_steps = question
        .model_outputs
        .iter()
        .rposition(|step| {
            ModelKey::LEDGER_ORDER
                .iter()
                .any(|key| step.get(key).is_some_and(|v| !v.trim().is_empty()))
        })
        .map_or(0, |last| last + 1);

    for step in &question.model_outputs[..written_steps] {
        values.extend(
            ModelKey::LEDGER_ORDER
                .iter()
                .map(|key| step.get(key).unwrap_or("").to_string()),
        );
    }

    Some(LedgerRow {
        range: CellRange::row_span(anchor, values.len()),
        values,
    })
}

/// Encodes every addressable question.
pub fn encode_ledger(questions: &[Question]) -> Vec<LedgerRow> {
    questions.iter().filter_map(encode_question).collect()
}

fn flag_cell(set: bool) -> String {
    if set { FLAG.to_string() } else { String::new() }
}

// ---------------------------------------------------------------------------
// Ingested questions
// ---------------------------------------------------------------------------

/// Turns the structured output of an upload ingestion into new ledger rows
/// (columns B..D), numbered consecutively from `first`.
///
/// The output is an object keyed by question label (an array of entries is
/// also accepted). Each entry carries its text under `question` or
/// `operation` and its present under `present` or `instance`. Entries with no
/// text are skipped.
pub fn ingested_rows(output: &Value, first: QuestionNumber) -> Vec<LedgerRow> {
    let entries: Vec<&Value> = match output {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    let mut number = first.as_u64().max(1);
    let mut rows = Vec::new();
    for entry in entries {
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| entry.get(*name).and_then(Value::as_str))
                .map(str::trim)
                .unwrap_or("")
                .to_string()
        };
        let text = field(&["question", "operation"]);
        if text.is_empty() {
            continue;
        }
        let present = field(&["present", "instance"]);
        let question_number = QuestionNumber::new(number);
        let Some(anchor) = row_anchor(question_number) else {
            break;
        };
        let values = vec![question_number.to_string(), text, present];
        rows.push(LedgerRow {
            range: CellRange::row_span(anchor, values.len()),
            values,
        });
        number = number.saturating_add(1);
    }
    rows
}

// ---------------------------------------------------------------------------
// Processing order
// ---------------------------------------------------------------------------

/// What `process_ledger` does with a question on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Evaluate,
    AlreadyResolved,
    /// Reload is recognised but not actioned; the question stays as it is.
    ReloadRequested,
    /// Numbered `0` or too large for a sheet row: no ledger row to write
    /// back to.
    Unaddressable,
}

impl Disposition {
    pub fn of(question: &Question) -> Self {
        if question.resolved {
            Self::AlreadyResolved
        } else if question.reload_requested {
            Self::ReloadRequested
        } else if row_anchor(question.question_number).is_none() {
            Self::Unaddressable
        } else {
            Self::Evaluate
        }
    }
}

/// Questions in ascending number order, each with its disposition.
///
/// Numbers are unique once checkpointed; see
/// [`checkpoint_ledger`](crate::checkpoint::checkpoint_ledger).
pub fn processing_order(questions: &[Question]) -> Vec<(&Question, Disposition)> {
    let mut ordered: Vec<&Question> = questions.iter().collect();
    ordered.sort_by_key(|q| q.question_number);
    ordered
        .into_iter()
        .map(|q| (q, Disposition::of(q)))
        .collect()
}
