//! Template workbook lookup and the per-run present cache.

use std::collections::{BTreeSet, HashMap};

use pipeline::ports::{CloudStorage, SpreadsheetService};
use pipeline::present::Present;
use pipeline::{FolderId, OrchestratorError, ServiceError, SpreadsheetId, TabName};
use tracing::{debug, instrument, warn};

/// Finds the workbook named `name` in the templates folder.
///
/// The name must match exactly one file.
#[instrument(skip(storage))]
pub async fn resolve_template(
    storage: &dyn CloudStorage,
    folder: &FolderId,
    name: &str,
) -> Result<SpreadsheetId, OrchestratorError> {
    let matches: Vec<_> = storage
        .list_files(folder)
        .await?
        .into_iter()
        .filter(|file| file.name == name)
        .collect();

    let not_found = || OrchestratorError::TemplateNotFound {
        name: name.to_string(),
    };
    match matches.as_slice() {
        [] => Err(not_found()),
        [file] => SpreadsheetId::new(file.id.as_str()).ok_or_else(not_found),
        many => Err(OrchestratorError::DuplicateTemplate {
            name: name.to_string(),
            count: many.len(),
        }),
    }
}

/// Presents of one workbook, each read and parsed at most once.
pub struct PresentCache<'a> {
    sheets: &'a dyn SpreadsheetService,
    workbook: &'a SpreadsheetId,
    tabs: BTreeSet<String>,
    parsed: HashMap<String, Present>,
}

impl<'a> PresentCache<'a> {
    pub async fn load(
        sheets: &'a dyn SpreadsheetService,
        workbook: &'a SpreadsheetId,
    ) -> Result<Self, ServiceError> {
        let tabs = sheets
            .list_tabs(workbook)
            .await?
            .into_iter()
            .map(|tab| tab.as_str().to_string())
            .collect();
        Ok(Self {
            sheets,
            workbook,
            tabs,
            parsed: HashMap::new(),
        })
    }

    /// The present named `name`, or `fallback` when the workbook has no such
    /// tab. `None` when neither exists.
    pub async fn resolve(
        &mut self,
        name: &str,
        fallback: &str,
    ) -> Result<Option<&Present>, ServiceError> {
        let chosen = if self.ensure(name).await? {
            name
        } else if self.ensure(fallback).await? {
            warn!(present = name, fallback, "present not found, using fallback");
            fallback
        } else {
            warn!(present = name, fallback, "neither present nor fallback exists");
            return Ok(None);
        };
        Ok(self.parsed.get(chosen))
    }

    async fn ensure(&mut self, name: &str) -> Result<bool, ServiceError> {
        if self.parsed.contains_key(name) {
            return Ok(true);
        }
        let Some(tab) = TabName::new(name).filter(|_| self.tabs.contains(name)) else {
            return Ok(false);
        };
        let grid = self.sheets.read_tab(self.workbook, &tab).await?;
        let present = Present::from_grid(name, &grid);
        debug!(present = name, steps = present.steps.len(), "present parsed");
        self.parsed.insert(name.to_string(), present);
        Ok(true)
    }
}
