//! Control-panel reader and the coordination port built on it.
//!
//! The control panel is a fixed-layout spreadsheet tab edited by an operator.
//! Its toggle cell gates every run: only the literal [`START_SENTINEL`] starts
//! one, and the polling loop writes [`FINISHED_SENTINEL`] back once a non-idle
//! handler returns.
//!
//! ## Turn-taking
//!
//! The toggle is advisory, not a lock. Nothing stops the operator writing
//! `start` again before `finished` lands (the second request is then lost), and
//! nothing stops a second process instance polling the same panel. A single
//! active instance is assumed.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::grid::{cell_value, CellAddress};
use crate::ports::SpreadsheetService;
use crate::{Grid, ServiceError, SpreadsheetId, TabName, Timestamp};

/// Toggle value that requests a run.
pub const START_SENTINEL: &str = "start";

/// Toggle value written after a run completes.
pub const FINISHED_SENTINEL: &str = "finished";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Control-panel content that cannot be turned into a [`RunConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("run duration cell {cell} is empty but run mode is wait_for_uploads")]
    MissingRunDuration { cell: String },

    #[error("run duration cell {cell} is not a whole number of hours: {value:?}")]
    InvalidRunDuration { cell: String, value: String },
}

/// Failure to read the coordination state.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// What the operator asked the loop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    ProcessUploads,
    ProcessLedger,
    WaitForUploads,
    Waiting,
    /// Any other text in the run-mode cell.
    Unrecognized(String),
}

impl RunMode {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "process_uploads" => Self::ProcessUploads,
            "process_ledger" => Self::ProcessLedger,
            "wait_for_uploads" => Self::WaitForUploads,
            "waiting" => Self::Waiting,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

/// One poll's worth of configuration. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub start: bool,
    pub template_file: String,
    pub run_mode: RunMode,
    /// Hours to wait for uploads; present only for [`RunMode::WaitForUploads`].
    pub run_duration: Option<u32>,
    pub timestamp: Timestamp,
}

/// Outcome of reading the control panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelReading {
    Ready(RunConfig),
    NotReady,
}

/// Where each named control lives on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMap {
    pub toggle_button: CellAddress,
    pub template_file_name: CellAddress,
    pub run_mode: CellAddress,
    pub run_duration_hours: CellAddress,
    // Reserved: present on the panel, not read by the orchestrator.
    pub system_state: CellAddress,
    pub last_check_time: CellAddress,
    pub computer_vision_mode: CellAddress,
}

impl Default for CellMap {
    fn default() -> Self {
        let cell = |row| CellAddress::fixed(row, 3);
        Self {
            system_state: cell(1),
            last_check_time: cell(2),
            toggle_button: cell(8),
            template_file_name: cell(9),
            run_mode: cell(10),
            run_duration_hours: cell(11),
            computer_vision_mode: cell(12),
        }
    }
}

/// Interprets a control-panel grid.
///
/// Returns [`PanelReading::NotReady`] unless the toggle cell holds exactly
/// [`START_SENTINEL`] (surrounding whitespace ignored). The run duration is
/// only read, and is then mandatory, for [`RunMode::WaitForUploads`].
pub fn read_config(
    grid: &Grid,
    cells: &CellMap,
    now: Timestamp,
) -> Result<PanelReading, ConfigError> {
    let toggle = cell_value(grid, cells.toggle_button).trim();
    if toggle != START_SENTINEL {
        debug!(toggle, "control panel not started");
        return Ok(PanelReading::NotReady);
    }

    let run_mode = RunMode::parse(cell_value(grid, cells.run_mode));
    let run_duration = match run_mode {
        RunMode::WaitForUploads => Some(parse_duration(grid, cells.run_duration_hours)?),
        _ => None,
    };

    Ok(PanelReading::Ready(RunConfig {
        start: true,
        template_file: cell_value(grid, cells.template_file_name).trim().to_string(),
        run_mode,
        run_duration,
        timestamp: now,
    }))
}

fn parse_duration(grid: &Grid, cell: CellAddress) -> Result<u32, ConfigError> {
    let raw = cell_value(grid, cell).trim();
    if raw.is_empty() {
        return Err(ConfigError::MissingRunDuration {
            cell: cell.to_string(),
        });
    }
    raw.parse().map_err(|_| ConfigError::InvalidRunDuration {
        cell: cell.to_string(),
        value: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Coordination port
// ---------------------------------------------------------------------------

/// The shared flag through which the operator and the loop take turns.
#[async_trait]
pub trait CoordinationPort: Send + Sync {
    /// Reads the current request, if any.
    async fn read_state(&self) -> Result<PanelReading, PanelError>;

    /// Marks the current request as handled.
    async fn signal_done(&self) -> Result<(), ServiceError>;

    /// Refreshes the credentials used to reach the panel.
    async fn reauthenticate(&self) -> Result<(), ServiceError>;
}

/// [`CoordinationPort`] backed by a control-panel spreadsheet tab.
pub struct SheetControlPanel {
    sheets: Arc<dyn SpreadsheetService>,
    spreadsheet: SpreadsheetId,
    tab: TabName,
    cells: CellMap,
}

impl SheetControlPanel {
    pub fn new(
        sheets: Arc<dyn SpreadsheetService>,
        spreadsheet: SpreadsheetId,
        tab: TabName,
        cells: CellMap,
    ) -> Self {
        Self {
            sheets,
            spreadsheet,
            tab,
            cells,
        }
    }
}

#[async_trait]
impl CoordinationPort for SheetControlPanel {
    async fn read_state(&self) -> Result<PanelReading, PanelError> {
        let grid = self.sheets.read_tab(&self.spreadsheet, &self.tab).await?;
        Ok(read_config(&grid, &self.cells, Timestamp::now())?)
    }

    async fn signal_done(&self) -> Result<(), ServiceError> {
        self.sheets
            .write_cell(
                &self.spreadsheet,
                &self.tab,
                self.cells.toggle_button,
                FINISHED_SENTINEL,
            )
            .await
    }

    async fn reauthenticate(&self) -> Result<(), ServiceError> {
        self.sheets.reauthenticate().await
    }
}
