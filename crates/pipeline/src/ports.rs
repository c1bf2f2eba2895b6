//! Port traits for the external collaborators.
//!
//! The orchestrator needs only the input/output contracts of the spreadsheet,
//! cloud-storage, document and model services. Infrastructure crates provide
//! the implementations; tests provide in-memory fakes.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::grid::{CellAddress, CellRange};
use crate::{
    DocumentId, FileId, FolderId, Grid, ModelId, ServiceError, SpreadsheetId, TabName,
};

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

/// Read/write access to spreadsheet tabs.
#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// Reads a whole tab as a grid of formatted cell strings.
    async fn read_tab(&self, spreadsheet: &SpreadsheetId, tab: &TabName)
        -> Result<Grid, ServiceError>;

    /// Writes one cell.
    async fn write_cell(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &TabName,
        cell: CellAddress,
        value: &str,
    ) -> Result<(), ServiceError>;

    /// Writes a block of rows starting at `range.start`.
    async fn write_range(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &TabName,
        range: CellRange,
        rows: &[Vec<String>],
    ) -> Result<(), ServiceError>;

    /// Lists the tab names of a spreadsheet, in sheet order.
    async fn list_tabs(&self, spreadsheet: &SpreadsheetId) -> Result<Vec<TabName>, ServiceError>;

    /// Discards cached credentials and obtains fresh ones.
    async fn reauthenticate(&self) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// Cloud storage
// ---------------------------------------------------------------------------

/// Metadata of one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    pub mime_type: String,
}

/// Folder-based file storage.
#[async_trait]
pub trait CloudStorage: Send + Sync {
    /// Lists the (non-folder, non-trashed) files directly inside `folder`.
    async fn list_files(&self, folder: &FolderId) -> Result<Vec<StoredFile>, ServiceError>;

    /// Downloads a file's content.
    async fn download(&self, file: &FileId) -> Result<Vec<u8>, ServiceError>;

    /// Moves a file from one folder to another.
    async fn move_file(&self, file: &FileId, from: &FolderId, to: &FolderId)
        -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Text to insert at a document index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInsert {
    pub index: u32,
    pub text: String,
}

/// Batch text insertion into a document.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Applies the inserts in order, as one batch.
    async fn insert_text(&self, document: &DocumentId, inserts: &[TextInsert])
        -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// File type of an attachment, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Image { media_type: &'static str },
    Unsupported,
}

impl AttachmentKind {
    pub fn from_file_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "png" => Self::Image { media_type: "image/png" },
            "jpg" | "jpeg" => Self::Image { media_type: "image/jpeg" },
            "gif" => Self::Image { media_type: "image/gif" },
            "webp" => Self::Image { media_type: "image/webp" },
            _ => Self::Unsupported,
        }
    }
}

/// A local file handed to the model alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub path: PathBuf,
    pub kind: AttachmentKind,
}

impl Attachment {
    /// Describes a downloaded file; the kind is derived from its name.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let kind = AttachmentKind::from_file_name(&name);
        Self {
            name,
            path: path.into(),
            kind,
        }
    }
}

/// One model invocation.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub model: &'a ModelId,
    /// The step's effective prompt.
    pub prompt: &'a str,
    /// The question (or other context text) the prompt is about.
    pub context: Option<&'a str>,
    pub attachments: &'a [Attachment],
}

impl ModelRequest<'_> {
    /// The text actually sent: the prompt followed by the context, separated
    /// by a blank line.
    pub fn full_prompt(&self) -> String {
        match self.context.filter(|c| !c.trim().is_empty()) {
            Some(context) => format!("{}\n\n{}", self.prompt, context),
            None => self.prompt.to_string(),
        }
    }
}

/// Failure of a single model invocation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model belongs to a family with no configured provider.
    #[error("no provider is configured for model '{model}'")]
    Unconfigured { model: String },

    /// The model identifier matches no known family.
    #[error("unknown model prefix in '{model}'")]
    UnknownModel { model: String },

    /// The provider answered but produced no text.
    #[error("model '{model}' returned an empty response")]
    EmptyResponse { model: String },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Invokes a named model.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<String, ModelError>;
}

// ---------------------------------------------------------------------------
// Local artefacts
// ---------------------------------------------------------------------------

/// Local persistence for downloaded uploads and ingestion output.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Saves a downloaded upload under a sanitised version of `name` and
    /// returns its local path.
    async fn save_upload(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ServiceError>;

    /// Saves the final structured output of an ingestion run.
    async fn save_ingestion_output(&self, json: &str) -> Result<PathBuf, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_kind_follows_extension() {
        assert_eq!(AttachmentKind::from_file_name("scan.PDF"), AttachmentKind::Pdf);
        assert_eq!(
            AttachmentKind::from_file_name("photo.jpeg"),
            AttachmentKind::Image { media_type: "image/jpeg" }
        );
        assert_eq!(
            AttachmentKind::from_file_name("notes.docx"),
            AttachmentKind::Unsupported
        );
        assert_eq!(AttachmentKind::from_file_name("README"), AttachmentKind::Unsupported);
    }

    #[test]
    fn full_prompt_appends_context_after_blank_line() {
        let model = ModelId::new("gpt-4o").unwrap();
        let request = ModelRequest {
            model: &model,
            prompt: "Answer briefly.",
            context: Some("What is X?"),
            attachments: &[],
        };
        assert_eq!(request.full_prompt(), "Answer briefly.\n\nWhat is X?");

        let bare = ModelRequest { context: None, ..request };
        assert_eq!(bare.full_prompt(), "Answer briefly.");
    }
}
