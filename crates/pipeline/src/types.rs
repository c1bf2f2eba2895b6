//! Shared value types for the ledger domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values that participate in domain computations: the question records kept in
//! a checkpoint, the per-step model outputs, and the wall-clock timestamp that
//! names a run.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ModelId, QuestionNumber};

/// A whole spreadsheet tab as returned by the spreadsheet service: rows of
/// cell strings. Rows may be ragged; trailing empty cells are usually absent.
pub type Grid = Vec<Vec<String>>;

// ---------------------------------------------------------------------------
// Canonical model keys
// ---------------------------------------------------------------------------

/// Canonical model family name used as a [`StepResult`] key.
///
/// Independent of model version strings: `gpt-4o` and `gpt-4.1-mini` both map
/// to [`ModelKey::GPT`]. Identifiers outside the known families keep their raw
/// text, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelKey(Cow<'static, str>);

impl ModelKey {
    pub const CLAUDE: ModelKey = ModelKey(Cow::Borrowed("CLAUDE"));
    pub const DEEPSEEK: ModelKey = ModelKey(Cow::Borrowed("DEEPSEEK"));
    pub const GEMINI: ModelKey = ModelKey(Cow::Borrowed("GEMINI"));
    pub const GPT: ModelKey = ModelKey(Cow::Borrowed("GPT"));

    /// Column order of the four ledger model columns within one step group.
    pub const LEDGER_ORDER: [ModelKey; 4] = [
        ModelKey::CLAUDE,
        ModelKey::DEEPSEEK,
        ModelKey::GEMINI,
        ModelKey::GPT,
    ];

    /// Maps a raw model identifier to its canonical family by prefix.
    ///
    /// Matching ignores ASCII case; unknown identifiers are upper-cased.
    pub fn canonicalize(model: &ModelId) -> Self {
        let lower = model.as_str().trim().to_ascii_lowercase();
        if lower.starts_with("gpt") {
            Self::GPT
        } else if lower.starts_with("claude") {
            Self::CLAUDE
        } else if lower.starts_with("gemini") {
            Self::GEMINI
        } else if lower.starts_with("deepseek") {
            Self::DEEPSEEK
        } else {
            Self(Cow::Owned(model.as_str().trim().to_uppercase()))
        }
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

/// Outputs of one present step, keyed by canonical model.
///
/// Entries are ordered by model key, never by completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepResult(BTreeMap<ModelKey, String>);

impl StepResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `output` under `key`, replacing any earlier entry.
    pub fn insert(&mut self, key: ModelKey, output: impl Into<String>) {
        self.0.insert(key, output.into());
    }

    /// Returns the output recorded for `key`.
    pub fn get(&self, key: &ModelKey) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in model-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ModelKey, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Returns `true` if any entry holds non-blank text.
    pub fn has_content(&self) -> bool {
        self.0.values().any(|v| !v.trim().is_empty())
    }
}

impl FromIterator<(ModelKey, String)> for StepResult {
    fn from_iter<I: IntoIterator<Item = (ModelKey, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// One question row of the ledger, as held in a checkpoint.
///
/// The serialised field names are the checkpoint file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_number: QuestionNumber,

    #[serde(rename = "question")]
    pub text: String,

    /// Name of the present (tab) that evaluates this question.
    #[serde(rename = "present")]
    pub present_name: String,

    #[serde(rename = "reload_question")]
    pub reload_requested: bool,

    pub resolved: bool,

    /// One entry per evaluated step, in step order.
    #[serde(default)]
    pub model_outputs: Vec<StepResult>,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Format used by the spreadsheet UI for date-times, e.g. `03/15/2024 14:30:22`.
pub const SHEET_DATETIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses a spreadsheet-formatted date-time (`MM/DD/YYYY HH:MM:SS`).
    pub fn parse_sheet(value: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(value.trim(), SHEET_DATETIME_FORMAT)
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Formats the timestamp for a spreadsheet cell.
    pub fn to_sheet_string(self) -> String {
        self.0.format(SHEET_DATETIME_FORMAT).to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> ModelId {
        ModelId::new(id).unwrap()
    }

    #[test]
    fn canonicalize_maps_known_families_by_prefix() {
        assert_eq!(ModelKey::canonicalize(&model("gpt-4o")), ModelKey::GPT);
        assert_eq!(
            ModelKey::canonicalize(&model("claude-sonnet-4-20250514")),
            ModelKey::CLAUDE
        );
        assert_eq!(
            ModelKey::canonicalize(&model("gemini-1.5-pro")),
            ModelKey::GEMINI
        );
        assert_eq!(
            ModelKey::canonicalize(&model("deepseek-chat")),
            ModelKey::DEEPSEEK
        );
    }

    #[test]
    fn canonicalize_uppercases_unknown_identifiers() {
        assert_eq!(ModelKey::canonicalize(&model("mistral-large")).as_str(), "MISTRAL-LARGE");
    }

    #[test]
    fn step_result_serialises_as_object_keyed_by_model() {
        let mut step = StepResult::new();
        step.insert(ModelKey::GPT, "b");
        step.insert(ModelKey::CLAUDE, "a");
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, r#"{"CLAUDE":"a","GPT":"b"}"#);
    }

    #[test]
    fn question_uses_checkpoint_field_names() {
        let question = Question {
            question_number: QuestionNumber::new(3),
            text: "Summarize X".into(),
            present_name: "PRESENT_A".into(),
            reload_requested: false,
            resolved: true,
            model_outputs: vec![],
        };
        let value = serde_json::to_value(&question).unwrap();
        assert_eq!(value["question_number"], 3);
        assert_eq!(value["question"], "Summarize X");
        assert_eq!(value["present"], "PRESENT_A");
        assert_eq!(value["reload_question"], false);
        assert_eq!(value["resolved"], true);
        assert!(value["model_outputs"].as_array().unwrap().is_empty());
    }

    #[test]
    fn sheet_timestamps_round_trip() {
        let ts = Timestamp::parse_sheet("03/15/2024 14:30:22").unwrap();
        assert_eq!(ts.to_sheet_string(), "03/15/2024 14:30:22");
        assert!(Timestamp::parse_sheet("2024-03-15").is_none());
    }
}
