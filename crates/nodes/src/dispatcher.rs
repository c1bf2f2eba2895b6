//! State dispatcher: one control-panel reading in, one [`RunState`] out.

use std::time::Duration;

use pipeline::control_panel::{CoordinationPort, PanelError, PanelReading, RunConfig, RunMode};
use pipeline::{ServiceError, ServiceKind, Timestamp};
use tracing::{debug, warn};

/// What every non-idle state needs to know about the requested run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Name of the template workbook in the templates folder.
    pub template_file: String,
    /// When the request was read. Keys the run's checkpoint.
    pub timestamp: Timestamp,
}

/// The state the loop is in for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Waiting,
    ProcessUploads(Job),
    ProcessLedger(Job),
    WaitForUploads { job: Job, duration: Duration },
}

impl RunState {
    pub fn from_config(config: RunConfig) -> Self {
        let job = Job {
            template_file: config.template_file,
            timestamp: config.timestamp,
        };
        match config.run_mode {
            RunMode::ProcessUploads => Self::ProcessUploads(job),
            RunMode::ProcessLedger => Self::ProcessLedger(job),
            RunMode::WaitForUploads => Self::WaitForUploads {
                job,
                duration: config.run_duration.map_or(Duration::ZERO, hours),
            },
            RunMode::Waiting => Self::Waiting,
            RunMode::Unrecognized(mode) => {
                warn!(%mode, "unrecognised run mode, staying idle");
                Self::Waiting
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::ProcessUploads(_) => "process_uploads",
            Self::ProcessLedger(_) => "process_ledger",
            Self::WaitForUploads { .. } => "wait_for_uploads",
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

fn hours(h: u32) -> Duration {
    Duration::from_secs(u64::from(h) * 3600)
}

/// Reads the panel and decides the next state.
///
/// A failed read of the panel sheet, or any transient service failure,
/// triggers one reauthentication and yields [`RunState::Waiting`]; the next
/// tick tries again. Panel content that cannot be interpreted is returned.
pub async fn dispatch(panel: &dyn CoordinationPort) -> Result<RunState, PanelError> {
    match panel.read_state().await {
        Ok(PanelReading::Ready(config)) => {
            let state = RunState::from_config(config);
            debug!(state = state.name(), "control panel requested a run");
            Ok(state)
        }
        Ok(PanelReading::NotReady) => Ok(RunState::Waiting),
        Err(PanelError::Service(e)) if worth_reauthenticating(&e) => {
            warn!(error = %e, "control panel read failed, reauthenticating");
            if let Err(e) = panel.reauthenticate().await {
                warn!(error = %e, "reauthentication failed");
            }
            Ok(RunState::Waiting)
        }
        Err(e) => Err(e),
    }
}

fn worth_reauthenticating(e: &ServiceError) -> bool {
    e.is_transient() || e.service() == ServiceKind::Spreadsheet
}
