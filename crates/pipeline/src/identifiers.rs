//! Newtype domain identifiers.
//!
//! Every external resource the orchestrator addresses (spreadsheets, tabs,
//! folders, files, documents, models) is represented as a distinct newtype
//! wrapping a `String`. This prevents accidentally interchanging, for example,
//! a [`FolderId`] with a [`FileId`] even though both are opaque strings issued
//! by the same storage service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: integer-backed
// ---------------------------------------------------------------------------

/// Number of a question row in the ledger.
///
/// Unique within one ledger snapshot. Doubles as the processing priority
/// (ascending) and as the address of the question's ledger row. A blank or
/// non-numeric cell decodes to `0`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct QuestionNumber(u64);

impl QuestionNumber {
    /// Creates a question number from a raw integer.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Parses a ledger cell, defaulting to `0` when it is blank or not a
    /// non-negative integer.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Self(trimmed.parse().unwrap_or(0))
        } else {
            Self(0)
        }
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for the placeholder number given to rows with no usable
    /// number. Such rows have no addressable ledger row.
    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for QuestionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single handler execution (one non-idle tick of the loop).
///
/// Generated fresh for every dispatched run; recorded on the handler span so
/// all activity from a single run can be correlated in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (service-issued ids and names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a spreadsheet (the control panel or a template workbook).
    SpreadsheetId
}

string_id! {
    /// Names one tab of a spreadsheet (e.g. `"CONTROL_PANEL"`, `"LEDGER"`).
    TabName
}

string_id! {
    /// Identifies a folder in the cloud-storage service.
    FolderId
}

string_id! {
    /// Identifies a file in the cloud-storage service.
    FileId
}

string_id! {
    /// Identifies a document written by the document-writing service.
    DocumentId
}

string_id! {
    /// A raw model identifier as written in a present (e.g. `"gpt-4o"`,
    /// `"claude-sonnet-4-20250514"`).
    ///
    /// Never used as a result key; see [`crate::ModelKey`] for the canonical
    /// family name.
    ModelId
}
