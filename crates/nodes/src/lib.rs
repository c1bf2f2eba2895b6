//! LLM-Plus run handlers and the polling loop that drives them.
//!
//! Each tick of the [`Orchestrator`] reads the control panel, turns it into a
//! [`RunState`] and runs the matching handler to completion:
//!
//! | State | Handler |
//! |-------|---------|
//! | `Waiting` | none; the loop backs off |
//! | `ProcessUploads` | [`uploads::process_uploads`], then the ledger |
//! | `ProcessLedger` | [`ledger::process_ledger`] |
//! | `WaitForUploads` | [`uploads::wait_for_uploads`] |
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Handlers sequence calls between business logic in
//! the [`pipeline`] crate and the port traits it defines (spreadsheet, storage,
//! documents, models, checkpoints). They contain no domain rules of their own.

pub mod dispatcher;
pub mod executor;
pub mod ledger;
pub mod settings;
pub mod template;
pub mod uploads;

#[cfg(test)]
mod fakes;

pub use dispatcher::{dispatch, Job, RunState};
pub use executor::{Orchestrator, Services, TickOutcome};
pub use settings::OrchestratorSettings;
