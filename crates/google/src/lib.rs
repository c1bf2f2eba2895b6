//! LLM-Plus Google infrastructure adapter.
//!
//! Implements the collaborator traits defined in the [`pipeline`] crate
//! (`SpreadsheetService`, `CloudStorage`, `DocumentService`) over the Sheets
//! v4, Drive v3 and Docs v1 REST APIs using `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! All Google API details (A1 quoting, pagination, status mapping, bearer
//! tokens) are handled here; the [`pipeline`] crate never sees them.
//!
//! ## Errors
//!
//! Every failure is reported as a [`pipeline::ServiceError`]: 401/403 become
//! `Authentication`, 404 becomes `NotFound`, other statuses `Api`, and
//! connection failures or timeouts `Transport`.

pub mod auth;
pub mod client;
pub mod docs;
pub mod drive;
pub mod sheets;

pub use auth::{TokenProvider, TokenSource};
pub use client::{GoogleClient, GoogleConfig};
pub use docs::GoogleDocs;
pub use drive::GoogleDrive;
pub use sheets::GoogleSheets;
