//! Static settings shared by every handler.

use std::time::Duration;

use pipeline::{DocumentId, FolderId, TabName};

pub const DEFAULT_CONTROL_TAB: &str = "CONTROL_PANEL";
pub const DEFAULT_LEDGER_TAB: &str = "LEDGER";
pub const DEFAULT_CV_PRESENT: &str = "CV_PRESENT";

/// Present used when a question names one the template does not have.
pub const DEFAULT_PRESENT: &str = "TEST_PRESENT";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_secs(10);
pub const DEFAULT_UPLOAD_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Where handlers find their inputs and how often the loop polls.
///
/// The ledger and present tabs live in the template workbook named on the
/// control panel, not in the control spreadsheet itself.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub ledger_tab: TabName,
    /// Present run over uploaded files during ingestion.
    pub cv_present: TabName,
    pub default_present: String,
    pub uploads_folder: FolderId,
    pub archive_folder: FolderId,
    pub templates_folder: FolderId,
    /// Document that receives the report of resolved questions, if any.
    pub report_document: Option<DocumentId>,
    pub poll_interval: Duration,
    pub idle_backoff: Duration,
    pub upload_poll_interval: Duration,
}
