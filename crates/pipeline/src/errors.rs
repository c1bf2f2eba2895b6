//! Top-level error and retry-policy types for the orchestration domain.
//!
//! [`OrchestratorError`] covers conditions that terminate one handler
//! invocation. The polling loop logs them and keeps polling. Component-level
//! errors (control-panel parsing, checkpoint I/O, evaluation) are defined in
//! their respective modules and convert into it.
//!
//! [`ServiceError`] is the common failure type of every external collaborator
//! port. [`RetryPolicy`] is a cross-cutting concern: the dispatcher asks a
//! [`ServiceError`] for its policy to decide whether reauthenticating and
//! idling is appropriate.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::control_panel::ConfigError;
use crate::evaluation::EvaluationError;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: authentication expiry, API rejections, transport
///   failures.
/// - `NonRetryable` errors: missing resources, malformed payloads, local I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry on the
        /// caller's own schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried without human intervention.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Service errors
// ---------------------------------------------------------------------------

/// The external collaborator a [`ServiceError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Spreadsheet,
    Storage,
    Documents,
    Model,
    /// The local download/output directories.
    Workspace,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Spreadsheet => "spreadsheet",
            Self::Storage => "storage",
            Self::Documents => "documents",
            Self::Model => "model",
            Self::Workspace => "workspace",
        };
        f.write_str(name)
    }
}

/// Failure reported by an external service adapter.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Credentials were rejected or have expired.
    #[error("{service} authentication failed: {message}")]
    Authentication { service: ServiceKind, message: String },

    /// The service answered with a non-success status.
    #[error("{service} API error (status {status}): {message}")]
    Api {
        service: ServiceKind,
        status: u16,
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("{service} resource not found: {resource}")]
    NotFound {
        service: ServiceKind,
        resource: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("{service} transport error: {message}")]
    Transport { service: ServiceKind, message: String },

    /// The response could not be interpreted.
    #[error("{service} returned an unexpected payload: {message}")]
    Decode { service: ServiceKind, message: String },

    /// A local file operation failed.
    #[error("{service} I/O error on {path}: {message}")]
    Io {
        service: ServiceKind,
        path: String,
        message: String,
    },
}

/// Longest response-body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 512;

impl ServiceError {
    /// Classifies a non-success HTTP status.
    ///
    /// 401 and 403 mean the credentials are no longer accepted; 404 names the
    /// missing `resource`. The response body is kept, truncated, as the message.
    pub fn from_status(
        service: ServiceKind,
        status: u16,
        resource: impl Into<String>,
        body: &str,
    ) -> Self {
        match status {
            401 | 403 => Self::Authentication {
                service,
                message: excerpt(body),
            },
            404 => Self::NotFound {
                service,
                resource: resource.into(),
            },
            _ => Self::Api {
                service,
                status,
                message: excerpt(body),
            },
        }
    }

    /// The service that produced this error.
    pub fn service(&self) -> ServiceKind {
        match self {
            Self::Authentication { service, .. }
            | Self::Api { service, .. }
            | Self::NotFound { service, .. }
            | Self::Transport { service, .. }
            | Self::Decode { service, .. }
            | Self::Io { service, .. } => *service,
        }
    }

    /// Classifies the error for retry decisions.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Authentication { .. } | Self::Api { .. } | Self::Transport { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::NotFound { .. } | Self::Decode { .. } | Self::Io { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }

    /// Returns `true` when reauthenticating and trying again later may help.
    pub fn is_transient(&self) -> bool {
        matches!(self.retry_policy(), RetryPolicy::Retryable { .. })
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Handler-level errors
// ---------------------------------------------------------------------------

/// Errors that terminate a single handler invocation.
///
/// None of these stop the polling loop; the next tick starts afresh from the
/// control panel.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No file with the configured template name exists in the templates folder.
    #[error("Template file '{name}' was not found in the templates folder")]
    TemplateNotFound { name: String },

    /// More than one file carries the configured template name.
    #[error("Template file name '{name}' is ambiguous: {count} files match")]
    DuplicateTemplate { name: String, count: usize },

    /// The control panel content could not be interpreted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external service failed in a way the handler cannot absorb.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The checkpoint store could not be read or written.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// The evaluation pipeline violated one of its output contracts.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
