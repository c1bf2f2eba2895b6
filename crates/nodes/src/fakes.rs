//! In-memory port implementations shared by the handler tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::checkpoint::MemoryCheckpointStore;
use pipeline::control_panel::{CoordinationPort, PanelError, PanelReading};
use pipeline::grid::{CellAddress, CellRange};
use pipeline::ports::{
    ArtifactStore, CloudStorage, DocumentService, ModelError, ModelRequest, ModelService,
    SpreadsheetService, StoredFile, TextInsert,
};
use pipeline::{
    DocumentId, FileId, FolderId, Grid, ServiceError, ServiceKind, SpreadsheetId, TabName,
};

use crate::executor::Services;
use crate::settings::OrchestratorSettings;

pub const WORKBOOK: &str = "wb-1";
pub const TEMPLATE_NAME: &str = "Template A";

pub fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

pub fn tab(name: &str) -> TabName {
    TabName::new(name).unwrap()
}

// ---------------------------------------------------------------------------
// Spreadsheets
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSheets {
    tabs: Mutex<BTreeMap<(String, String), Grid>>,
    reads: Mutex<Vec<String>>,
    writes: Mutex<Vec<String>>,
    failing_row: Mutex<Option<u32>>,
    pub reauths: AtomicUsize,
}

impl FakeSheets {
    pub fn with_tab(self, spreadsheet: &str, tab: &str, grid: Grid) -> Self {
        self.tabs
            .lock()
            .unwrap()
            .insert((spreadsheet.to_string(), tab.to_string()), grid);
        self
    }

    pub fn tab(&self, spreadsheet: &str, tab: &str) -> Grid {
        self.tabs
            .lock()
            .unwrap()
            .get(&(spreadsheet.to_string(), tab.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Ranges written so far, as `TAB!A1:B1`.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Makes range writes starting on sheet row `row` fail; `None` clears it.
    pub fn fail_writes_to_row(&self, row: Option<u32>) {
        *self.failing_row.lock().unwrap() = row;
    }

    pub fn reads_of(&self, tab: &str) -> usize {
        self.reads.lock().unwrap().iter().filter(|t| *t == tab).count()
    }

    fn apply(&self, spreadsheet: &SpreadsheetId, tab: &TabName, start: CellAddress, rows: &[Vec<String>]) {
        let mut tabs = self.tabs.lock().unwrap();
        let grid = tabs
            .entry((spreadsheet.to_string(), tab.to_string()))
            .or_default();
        for (i, values) in rows.iter().enumerate() {
            let r = start.row_index() + i;
            if grid.len() <= r {
                grid.resize(r + 1, Vec::new());
            }
            for (j, value) in values.iter().enumerate() {
                let c = start.column_index() + j;
                if grid[r].len() <= c {
                    grid[r].resize(c + 1, String::new());
                }
                grid[r][c] = value.clone();
            }
        }
    }
}

#[async_trait]
impl SpreadsheetService for FakeSheets {
    async fn read_tab(&self, spreadsheet: &SpreadsheetId, tab: &TabName) -> Result<Grid, ServiceError> {
        self.reads.lock().unwrap().push(tab.to_string());
        self.tabs
            .lock()
            .unwrap()
            .get(&(spreadsheet.to_string(), tab.to_string()))
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                service: ServiceKind::Spreadsheet,
                resource: format!("{spreadsheet}/{tab}"),
            })
    }

    async fn write_cell(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &TabName,
        cell: CellAddress,
        value: &str,
    ) -> Result<(), ServiceError> {
        self.writes.lock().unwrap().push(format!("{tab}!{cell}"));
        self.apply(spreadsheet, tab, cell, &[vec![value.to_string()]]);
        Ok(())
    }

    async fn write_range(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &TabName,
        range: CellRange,
        rows: &[Vec<String>],
    ) -> Result<(), ServiceError> {
        if *self.failing_row.lock().unwrap() == Some(range.start.row()) {
            return Err(ServiceError::Api {
                service: ServiceKind::Spreadsheet,
                status: 500,
                message: format!("write to {tab}!{range} rejected"),
            });
        }
        self.writes.lock().unwrap().push(format!("{tab}!{range}"));
        self.apply(spreadsheet, tab, range.start, rows);
        Ok(())
    }

    async fn list_tabs(&self, spreadsheet: &SpreadsheetId) -> Result<Vec<TabName>, ServiceError> {
        Ok(self
            .tabs
            .lock()
            .unwrap()
            .keys()
            .filter(|(id, _)| id == spreadsheet.as_str())
            .filter_map(|(_, name)| TabName::new(name.clone()))
            .collect())
    }

    async fn reauthenticate(&self) -> Result<(), ServiceError> {
        self.reauths.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cloud storage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStorage {
    folders: Mutex<BTreeMap<String, Vec<StoredFile>>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_moves: AtomicBool,
}

impl FakeStorage {
    pub fn with_file(self, folder: &str, id: &str, name: &str, mime_type: &str) -> Self {
        self.folders
            .lock()
            .unwrap()
            .entry(folder.to_string())
            .or_default()
            .push(StoredFile {
                id: FileId::new(id).unwrap(),
                name: name.to_string(),
                mime_type: mime_type.to_string(),
            });
        self.contents
            .lock()
            .unwrap()
            .insert(id.to_string(), format!("bytes of {name}").into_bytes());
        self
    }

    /// The usual template workbook entry.
    pub fn with_template(self) -> Self {
        self.with_file(
            "templates",
            WORKBOOK,
            TEMPLATE_NAME,
            "application/vnd.google-apps.spreadsheet",
        )
    }

    pub fn names_in(&self, folder: &str) -> Vec<String> {
        self.folders
            .lock()
            .unwrap()
            .get(folder)
            .map(|files| files.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CloudStorage for FakeStorage {
    async fn list_files(&self, folder: &FolderId) -> Result<Vec<StoredFile>, ServiceError> {
        Ok(self
            .folders
            .lock()
            .unwrap()
            .get(folder.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn download(&self, file: &FileId) -> Result<Vec<u8>, ServiceError> {
        self.contents
            .lock()
            .unwrap()
            .get(file.as_str())
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                service: ServiceKind::Storage,
                resource: file.to_string(),
            })
    }

    async fn move_file(&self, file: &FileId, from: &FolderId, to: &FolderId) -> Result<(), ServiceError> {
        if self.fail_moves.load(Ordering::SeqCst) {
            return Err(ServiceError::Api {
                service: ServiceKind::Storage,
                status: 403,
                message: "insufficient permissions".into(),
            });
        }
        let mut folders = self.folders.lock().unwrap();
        let source = folders.entry(from.to_string()).or_default();
        let Some(pos) = source.iter().position(|f| &f.id == file) else {
            return Err(ServiceError::NotFound {
                service: ServiceKind::Storage,
                resource: file.to_string(),
            });
        };
        let moved = source.remove(pos);
        folders.entry(to.to_string()).or_default().push(moved);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Documents, models, artefacts
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDocs {
    pub batches: Mutex<Vec<(String, Vec<TextInsert>)>>,
}

#[async_trait]
impl DocumentService for FakeDocs {
    async fn insert_text(&self, document: &DocumentId, inserts: &[TextInsert]) -> Result<(), ServiceError> {
        self.batches
            .lock()
            .unwrap()
            .push((document.to_string(), inserts.to_vec()));
        Ok(())
    }
}

/// One recorded model invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub prompt: String,
    pub attachments: Vec<String>,
}

/// Answers `"{model} answer"` unless a reply was scripted.
#[derive(Default)]
pub struct FakeModels {
    replies: HashMap<String, Result<String, String>>,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeModels {
    pub fn reply(mut self, model: &str, text: &str) -> Self {
        self.replies.insert(model.to_string(), Ok(text.to_string()));
        self
    }

    pub fn fail(mut self, model: &str, message: &str) -> Self {
        self.replies.insert(model.to_string(), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelService for FakeModels {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<String, ModelError> {
        let model = request.model.to_string();
        self.calls.lock().unwrap().push(Call {
            model: model.clone(),
            prompt: request.full_prompt(),
            attachments: request.attachments.iter().map(|a| a.name.clone()).collect(),
        });
        match self.replies.get(&model) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(ModelError::Service(ServiceError::Api {
                service: ServiceKind::Model,
                status: 500,
                message: message.clone(),
            })),
            None => Ok(format!("{model} answer")),
        }
    }
}

#[derive(Default)]
pub struct FakeArtifacts {
    pub uploads: Mutex<Vec<String>>,
    pub outputs: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactStore for FakeArtifacts {
    async fn save_upload(&self, name: &str, _bytes: &[u8]) -> Result<PathBuf, ServiceError> {
        self.uploads.lock().unwrap().push(name.to_string());
        Ok(PathBuf::from("downloads").join(name))
    }

    async fn save_ingestion_output(&self, json: &str) -> Result<PathBuf, ServiceError> {
        self.outputs.lock().unwrap().push(json.to_string());
        Ok(PathBuf::from("outputs/model_output.json"))
    }
}

// ---------------------------------------------------------------------------
// Control panel
// ---------------------------------------------------------------------------

/// Replays scripted readings, then reports `NotReady`.
#[derive(Default)]
pub struct FakePanel {
    readings: Mutex<VecDeque<Result<PanelReading, PanelError>>>,
    pub done: AtomicUsize,
    pub reauths: AtomicUsize,
}

impl FakePanel {
    pub fn then(self, reading: Result<PanelReading, PanelError>) -> Self {
        self.readings.lock().unwrap().push_back(reading);
        self
    }
}

#[async_trait]
impl CoordinationPort for FakePanel {
    async fn read_state(&self) -> Result<PanelReading, PanelError> {
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PanelReading::NotReady))
    }

    async fn signal_done(&self) -> Result<(), ServiceError> {
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reauthenticate(&self) -> Result<(), ServiceError> {
        self.reauths.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        ledger_tab: tab("LEDGER"),
        cv_present: tab("CV_PRESENT"),
        default_present: "TEST_PRESENT".into(),
        uploads_folder: FolderId::new("uploads").unwrap(),
        archive_folder: FolderId::new("archive").unwrap(),
        templates_folder: FolderId::new("templates").unwrap(),
        report_document: None,
        poll_interval: Duration::from_millis(1),
        idle_backoff: Duration::from_millis(1),
        upload_poll_interval: Duration::from_millis(5),
    }
}

/// A two-step present: `raw` over GPT and Claude, then all prior outputs to GPT.
pub fn two_step_present() -> Grid {
    grid(&[
        &["", "Step", "Description", "Input", "Prompt", "Models"],
        &["", "#", "", "", "", ""],
        &["", "1", "Answer", "raw", "Answer the question.", "gpt-4o, claude-3-opus"],
        &["", "2", "Merge", "prior_all_outputs", "Merge these.", "gpt-4o"],
    ])
}

/// A one-step present answered by GPT only.
pub fn gpt_present() -> Grid {
    grid(&[
        &["", "Step", "Description", "Input", "Prompt", "Models"],
        &["", "#", "", "", "", ""],
        &["", "1", "Answer", "raw", "Answer tersely.", "gpt-4o"],
    ])
}

/// Ledger headers sized for two step groups (B..N).
pub fn ledger(rows: &[&[&str]]) -> Grid {
    let mut out = grid(&[&[""; 14], &[""; 14]]);
    out.extend(grid(rows));
    out
}

pub struct Harness {
    pub sheets: Arc<FakeSheets>,
    pub storage: Arc<FakeStorage>,
    pub models: Arc<FakeModels>,
    pub docs: Arc<FakeDocs>,
    pub checkpoints: Arc<MemoryCheckpointStore>,
    pub artifacts: Arc<FakeArtifacts>,
}

impl Harness {
    pub fn new(sheets: FakeSheets, storage: FakeStorage, models: FakeModels) -> Self {
        Self {
            sheets: Arc::new(sheets),
            storage: Arc::new(storage),
            models: Arc::new(models),
            docs: Arc::new(FakeDocs::default()),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            artifacts: Arc::new(FakeArtifacts::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            sheets: self.sheets.clone(),
            storage: self.storage.clone(),
            documents: self.docs.clone(),
            models: self.models.clone(),
            checkpoints: self.checkpoints.clone(),
            artifacts: self.artifacts.clone(),
        }
    }
}
