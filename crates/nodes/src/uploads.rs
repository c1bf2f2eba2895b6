//! Upload ingestion: turns files dropped in the uploads folder into new ledger
//! questions, then runs the ledger pass.

use std::path::PathBuf;
use std::time::Duration;

use pipeline::evaluation::{evaluate, parse_final_output};
use pipeline::ledger::{ingested_rows, next_question_number};
use pipeline::ports::{Attachment, StoredFile};
use pipeline::present::Present;
use pipeline::{OrchestratorError, SpreadsheetId};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::Job;
use crate::executor::Services;
use crate::ledger::{run_ledger, write_row, LedgerSummary};
use crate::settings::OrchestratorSettings;
use crate::template::resolve_template;

/// MIME types the models can read.
pub const SUPPORTED_MIME_TYPES: [&str; 5] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub fn is_supported(file: &StoredFile) -> bool {
    SUPPORTED_MIME_TYPES.contains(&file.mime_type.as_str())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    pub downloaded: usize,
    pub ignored: usize,
    /// Questions appended to the ledger.
    pub ingested: usize,
    pub output: Option<PathBuf>,
    pub ledger: LedgerSummary,
}

/// Ingests the current uploads into the template's ledger and evaluates it.
///
/// Supported files are downloaded and archived, then read by the CV present.
/// Its final output lists the new questions, which are appended after the
/// highest question number already in the ledger. Without supported uploads
/// the ingestion step is skipped and only the ledger pass runs.
#[instrument(skip_all, fields(template = %job.template_file))]
pub async fn process_uploads(
    services: &Services,
    settings: &OrchestratorSettings,
    job: &Job,
) -> Result<IngestionSummary, OrchestratorError> {
    let workbook = resolve_template(
        services.storage.as_ref(),
        &settings.templates_folder,
        &job.template_file,
    )
    .await?;

    let (supported, ignored): (Vec<_>, Vec<_>) = services
        .storage
        .list_files(&settings.uploads_folder)
        .await?
        .into_iter()
        .partition(is_supported);
    for file in &ignored {
        warn!(file = %file.name, mime_type = %file.mime_type, "unsupported upload ignored");
    }

    let mut summary = IngestionSummary {
        ignored: ignored.len(),
        ..Default::default()
    };

    if supported.is_empty() {
        info!("no supported uploads, skipping ingestion");
    } else {
        let attachments = collect(services, settings, &supported).await?;
        summary.downloaded = attachments.len();
        let (ingested, output) = ingest(services, settings, &workbook, &attachments).await?;
        summary.ingested = ingested;
        summary.output = Some(output);
    }

    summary.ledger = run_ledger(services, settings, &workbook, job.timestamp).await?;
    Ok(summary)
}

/// Downloads each file locally and moves it to the archive folder.
async fn collect(
    services: &Services,
    settings: &OrchestratorSettings,
    files: &[StoredFile],
) -> Result<Vec<Attachment>, OrchestratorError> {
    let mut attachments = Vec::with_capacity(files.len());
    for file in files {
        let bytes = services.storage.download(&file.id).await?;
        let path = services.artifacts.save_upload(&file.name, &bytes).await?;
        debug!(file = %file.name, path = %path.display(), bytes = bytes.len(), "upload saved");
        attachments.push(Attachment::new(file.name.clone(), path));

        if let Err(e) = services
            .storage
            .move_file(&file.id, &settings.uploads_folder, &settings.archive_folder)
            .await
        {
            warn!(file = %file.name, error = %e, "upload could not be archived");
        }
    }
    Ok(attachments)
}

/// Runs the CV present over `attachments` and appends its questions to the
/// ledger. Returns the number of rows written and where the output was saved.
async fn ingest(
    services: &Services,
    settings: &OrchestratorSettings,
    workbook: &SpreadsheetId,
    attachments: &[Attachment],
) -> Result<(usize, PathBuf), OrchestratorError> {
    let sheets = services.sheets.as_ref();
    let grid = sheets.read_tab(workbook, &settings.cv_present).await?;
    let present = Present::from_grid(settings.cv_present.as_str(), &grid);

    let results = evaluate(&present.steps, None, attachments, services.models.as_ref()).await?;
    let output = parse_final_output(&results)?;
    let path = services
        .artifacts
        .save_ingestion_output(&output.to_json_text())
        .await?;

    let ledger = sheets.read_tab(workbook, &settings.ledger_tab).await?;
    let first = next_question_number(&ledger);
    let rows = ingested_rows(output.value(), first);
    for row in &rows {
        write_row(sheets, workbook, &settings.ledger_tab, row).await?;
    }
    info!(questions = rows.len(), %first, output = %path.display(), "uploads ingested");
    Ok((rows.len(), path))
}

/// Polls the uploads folder until a supported file arrives, then runs
/// [`process_uploads`]. Returns `None` when `duration` passes first.
#[instrument(skip_all, fields(template = %job.template_file, duration = ?duration))]
pub async fn wait_for_uploads(
    services: &Services,
    settings: &OrchestratorSettings,
    job: &Job,
    duration: Duration,
) -> Result<Option<IngestionSummary>, OrchestratorError> {
    let deadline = Instant::now() + duration;
    loop {
        let files = services.storage.list_files(&settings.uploads_folder).await?;
        if files.iter().any(is_supported) {
            info!(files = files.len(), "uploads arrived");
            return process_uploads(services, settings, job).await.map(Some);
        }

        let now = Instant::now();
        if now >= deadline {
            info!("no uploads arrived before the deadline");
            return Ok(None);
        }
        tokio::time::sleep(settings.upload_poll_interval.min(deadline - now)).await;
    }
}
