//! [`SpreadsheetService`] over the Sheets v4 REST API.

use async_trait::async_trait;
use pipeline::grid::{CellAddress, CellRange};
use pipeline::ports::SpreadsheetService;
use pipeline::{Grid, ServiceError, ServiceKind, SpreadsheetId, TabName};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::{endpoint, GoogleClient};

const SERVICE: ServiceKind = ServiceKind::Spreadsheet;

/// Values are stored exactly as sent; the sheet does not parse them.
const VALUE_INPUT_OPTION: &str = "RAW";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// A1 reference to a tab, optionally narrowed to a range within it.
///
/// Tab names other than plain identifiers are quoted, with embedded quotes
/// doubled.
pub fn a1_reference(tab: &TabName, range: Option<&str>) -> String {
    let name = tab.as_str();
    let plain = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let sheet = if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    };
    match range {
        Some(range) => format!("{sheet}!{range}"),
        None => sheet,
    }
}

/// Renders a cell returned by the API as the text the sheet shows.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub struct GoogleSheets {
    client: GoogleClient,
}

impl GoogleSheets {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }

    async fn put_values(
        &self,
        spreadsheet: &SpreadsheetId,
        reference: &str,
        rows: &[Vec<String>],
    ) -> Result<(), ServiceError> {
        let url = endpoint(
            SERVICE,
            &self.client.config().sheets_url,
            &["spreadsheets", spreadsheet.as_str(), "values", reference],
        )?;
        let body = ValueRangeBody {
            range: reference,
            major_dimension: "ROWS",
            values: rows,
        };
        let request = self
            .client
            .http()
            .put(url)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .json(&body);
        self.client.send(SERVICE, request).await?;
        debug!(range = reference, rows = rows.len(), "sheet values written");
        Ok(())
    }
}

#[async_trait]
impl SpreadsheetService for GoogleSheets {
    #[instrument(skip_all, fields(spreadsheet = %spreadsheet, tab = %tab))]
    async fn read_tab(&self, spreadsheet: &SpreadsheetId, tab: &TabName) -> Result<Grid, ServiceError> {
        let reference = a1_reference(tab, None);
        let url = endpoint(
            SERVICE,
            &self.client.config().sheets_url,
            &["spreadsheets", spreadsheet.as_str(), "values", &reference],
        )?;
        let range: ValueRange = self
            .client
            .send_json(SERVICE, self.client.http().get(url))
            .await?;
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn write_cell(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &TabName,
        cell: CellAddress,
        value: &str,
    ) -> Result<(), ServiceError> {
        let reference = a1_reference(tab, Some(&cell.to_string()));
        self.put_values(spreadsheet, &reference, &[vec![value.to_string()]])
            .await
    }

    async fn write_range(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &TabName,
        range: CellRange,
        rows: &[Vec<String>],
    ) -> Result<(), ServiceError> {
        let reference = a1_reference(tab, Some(&range.to_string()));
        self.put_values(spreadsheet, &reference, rows).await
    }

    async fn list_tabs(&self, spreadsheet: &SpreadsheetId) -> Result<Vec<TabName>, ServiceError> {
        let url = endpoint(
            SERVICE,
            &self.client.config().sheets_url,
            &["spreadsheets", spreadsheet.as_str()],
        )?;
        let request = self
            .client
            .http()
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);
        let meta: SpreadsheetMeta = self.client.send_json(SERVICE, request).await?;
        Ok(meta
            .sheets
            .into_iter()
            .filter_map(|sheet| TabName::new(sheet.properties.title))
            .collect())
    }

    async fn reauthenticate(&self) -> Result<(), ServiceError> {
        self.client.auth().refresh(SERVICE).await
    }
}
