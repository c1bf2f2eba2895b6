//! Core orchestration domain for LLM-Plus.
//!
//! This crate contains every domain concept, newtype identifier, codec and
//! pipeline algorithm used by the orchestrator. Infrastructure crates implement
//! the port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`QuestionNumber`, `ModelId`, etc.) |
//! | [`types`] | Shared value types (`Question`, `StepResult`, `ModelKey`, `Timestamp`) |
//! | [`errors`] | Top-level error and retry-policy types |
//! | [`grid`] | A1 cell addressing |
//! | [`ports`] | Spreadsheet, storage, document, model and artefact ports |
//! | [`control_panel`] | Control-panel reader and coordination port |
//! | [`present`] | Present resolver |
//! | [`ledger`] | Ledger codec and processing order |
//! | [`checkpoint`] | Checkpoint keys, store port and upsert |
//! | [`evaluation`] | Step-chaining evaluation pipeline |
//! | [`report`] | Document report rendering |

pub mod checkpoint;
pub mod control_panel;
pub mod errors;
pub mod evaluation;
pub mod grid;
pub mod identifiers;
pub mod ledger;
pub mod ports;
pub mod present;
pub mod report;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{OrchestratorError, RetryPolicy, ServiceError, ServiceKind};
pub use identifiers::{
    DocumentId, FileId, FolderId, ModelId, QuestionNumber, RunId, SpreadsheetId, TabName,
};
pub use types::{Grid, ModelKey, Question, StepResult, Timestamp};
