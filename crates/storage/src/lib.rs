//! LLM-Plus local file-system adapter.
//!
//! Implements [`pipeline::checkpoint::CheckpointStore`] and
//! [`pipeline::ports::ArtifactStore`] over two local directories:
//!
//! - the **outputs** directory holds one `YYYYMMDD_HHMMSS.json` checkpoint per
//!   run plus `model_output.json`, the latest ingestion output;
//! - the **downloads** directory holds uploads fetched from cloud storage.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//!
//! ## Durability
//!
//! Every file is written to a hidden `.{name}.tmp` sibling and then renamed
//! over the target, so a crash mid-write leaves the previous version intact.

mod workspace;

pub use workspace::{sanitize_file_name, LocalWorkspace, INGESTION_OUTPUT_FILE};
