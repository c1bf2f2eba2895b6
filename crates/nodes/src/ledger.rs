//! The ledger handler: evaluates every open question of the template's ledger.

use pipeline::checkpoint::{checkpoint_ledger, upsert_question, CheckpointKey};
use pipeline::evaluation::evaluate;
use pipeline::ledger::{encode_ledger, encode_question, processing_order, Disposition, LedgerRow};
use pipeline::ports::SpreadsheetService;
use pipeline::report::document_inserts;
use pipeline::{OrchestratorError, Question, ServiceError, SpreadsheetId, TabName, Timestamp};
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::Job;
use crate::executor::Services;
use crate::settings::OrchestratorSettings;
use crate::template::{resolve_template, PresentCache};

/// Counts of what one ledger pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub evaluated: usize,
    pub already_resolved: usize,
    /// Reload requests, unnumbered rows and questions with no present.
    pub skipped: usize,
    /// Questions whose evaluation failed; they stay unresolved.
    pub failed: usize,
}

/// Resolves the job's template and runs [`run_ledger`] on it.
#[instrument(skip_all, fields(template = %job.template_file))]
pub async fn process_ledger(
    services: &Services,
    settings: &OrchestratorSettings,
    job: &Job,
) -> Result<LedgerSummary, OrchestratorError> {
    let workbook = resolve_template(
        services.storage.as_ref(),
        &settings.templates_folder,
        &job.template_file,
    )
    .await?;
    run_ledger(services, settings, &workbook, job.timestamp).await
}

/// One pass over the ledger of `workbook`.
///
/// The ledger is checkpointed under the run timestamp first. Each evaluated
/// question is then upserted into the checkpoint and written back to its row
/// before the next one starts, so an interrupted pass loses at most the
/// question in flight. The pass ends by writing every checkpointed row back
/// and, when configured, reporting the newly resolved questions.
pub async fn run_ledger(
    services: &Services,
    settings: &OrchestratorSettings,
    workbook: &SpreadsheetId,
    timestamp: Timestamp,
) -> Result<LedgerSummary, OrchestratorError> {
    let sheets = services.sheets.as_ref();
    let checkpoints = services.checkpoints.as_ref();
    let key = CheckpointKey::from_timestamp(timestamp);

    let grid = sheets.read_tab(workbook, &settings.ledger_tab).await?;
    let questions = checkpoint_ledger(checkpoints, &key, &grid).await?;
    info!(checkpoint = %key, questions = questions.len(), "ledger checkpointed");

    let mut presents = PresentCache::load(sheets, workbook).await?;
    let mut summary = LedgerSummary::default();
    let mut resolved: Vec<Question> = Vec::new();

    for (question, disposition) in processing_order(&questions) {
        let number = question.question_number;
        match disposition {
            Disposition::Evaluate => {}
            Disposition::AlreadyResolved => {
                summary.already_resolved += 1;
                continue;
            }
            Disposition::ReloadRequested => {
                info!(question = %number, "reload requested, leaving question as is");
                summary.skipped += 1;
                continue;
            }
            Disposition::Unaddressable => {
                warn!(question = %number, text = %question.text, "question has no ledger row, skipping");
                summary.skipped += 1;
                continue;
            }
        }

        let Some(present) = presents
            .resolve(&question.present_name, &settings.default_present)
            .await?
        else {
            summary.skipped += 1;
            continue;
        };

        let outputs = match evaluate(
            &present.steps,
            Some(question.text.as_str()),
            &[],
            services.models.as_ref(),
        )
        .await
        {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(question = %number, error = %e, "evaluation failed, question left open");
                summary.failed += 1;
                continue;
            }
        };

        let mut done = question.clone();
        done.model_outputs = outputs;
        done.resolved = true;
        upsert_question(checkpoints, &key, &done).await?;
        if let Some(row) = encode_question(&done) {
            write_row(sheets, workbook, &settings.ledger_tab, &row).await?;
        }
        info!(question = %number, present = %present.name, "question resolved");
        summary.evaluated += 1;
        resolved.push(done);
    }

    let checkpointed = checkpoints.load(&key).await?.unwrap_or_default();
    for row in encode_ledger(&checkpointed) {
        write_row(sheets, workbook, &settings.ledger_tab, &row).await?;
    }
    debug!(rows = checkpointed.len(), "ledger written back");

    report(services, settings, &resolved).await;
    info!(?summary, "ledger pass complete");
    Ok(summary)
}

pub(crate) async fn write_row(
    sheets: &dyn SpreadsheetService,
    workbook: &SpreadsheetId,
    tab: &TabName,
    row: &LedgerRow,
) -> Result<(), ServiceError> {
    sheets
        .write_range(workbook, tab, row.range, std::slice::from_ref(&row.values))
        .await
}

/// Inserts the report of `resolved` into the report document, if one is set.
/// A failed insert is logged; the ledger is already up to date.
async fn report(services: &Services, settings: &OrchestratorSettings, resolved: &[Question]) {
    let Some(document) = &settings.report_document else {
        return;
    };
    let inserts = document_inserts(resolved);
    if inserts.is_empty() {
        return;
    }
    match services.documents.insert_text(document, &inserts).await {
        Ok(()) => info!(%document, sections = inserts.len(), "report written"),
        Err(e) => warn!(%document, error = %e, "report could not be written"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{
        gpt_present, ledger, settings, two_step_present, FakeModels, FakeSheets, FakeStorage,
        Harness, TEMPLATE_NAME, WORKBOOK,
    };
    use pipeline::checkpoint::CheckpointStore;
    use pipeline::{DocumentId, ModelKey};
    use std::sync::Arc;
    use storage::LocalWorkspace;

    fn job() -> Job {
        Job {
            template_file: TEMPLATE_NAME.into(),
            timestamp: Timestamp::now(),
        }
    }

    fn workbook(rows: &[&[&str]]) -> FakeSheets {
        FakeSheets::default()
            .with_tab(WORKBOOK, "LEDGER", ledger(rows))
            .with_tab(WORKBOOK, "PRESENT_A", two_step_present())
            .with_tab(WORKBOOK, "TEST_PRESENT", gpt_present())
    }

    #[tokio::test]
    async fn open_questions_are_evaluated_and_written_back() {
        let harness = Harness::new(
            workbook(&[
                &["", "1", "What is X?", "PRESENT_A", "", ""],
                &["", "2", "Done already", "PRESENT_A", "", "X", "old"],
            ]),
            FakeStorage::default().with_template(),
            FakeModels::default(),
        );

        let summary = process_ledger(&harness.services(), &settings(), &job())
            .await
            .unwrap();

        assert_eq!(
            summary,
            LedgerSummary {
                evaluated: 1,
                already_resolved: 1,
                ..Default::default()
            }
        );
        let grid = harness.sheets.tab(WORKBOOK, "LEDGER");
        let row = &grid[2];
        assert_eq!(row[5], "X");
        assert_eq!(row[6], "claude-3-opus answer");
        assert_eq!(row[9], "gpt-4o answer");
        assert_eq!(row[13], "gpt-4o answer");

        let calls = harness.models.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].prompt, "Answer the question.\n\nWhat is X?");
        assert!(calls[2].prompt.starts_with("CLAUDE: claude-3-opus answer\n\nGPT: gpt-4o answer"));
    }

    #[tokio::test]
    async fn each_resolved_question_is_checkpointed() {
        let harness = Harness::new(
            workbook(&[
                &["", "2", "Second", "PRESENT_A", "", ""],
                &["", "1", "First", "TEST_PRESENT", "", ""],
            ]),
            FakeStorage::default().with_template(),
            FakeModels::default(),
        );
        let job = job();

        process_ledger(&harness.services(), &settings(), &job).await.unwrap();

        let key = CheckpointKey::from_timestamp(job.timestamp);
        let saved = harness.checkpoints.load(&key).await.unwrap().unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|q| q.resolved));
        assert_eq!(saved[0].question_number.as_u64(), 1);
        assert_eq!(saved[0].model_outputs[0].get(&ModelKey::GPT), Some("gpt-4o answer"));

        // The first question evaluated is number 1.
        assert_eq!(harness.models.calls()[0].prompt, "Answer tersely.\n\nFirst");
    }

    #[tokio::test]
    async fn duplicate_numbers_are_evaluated_once() {
        let harness = Harness::new(
            workbook(&[
                &["", "1", "First", "TEST_PRESENT", "", ""],
                &["", "1", "Dup", "TEST_PRESENT", "", ""],
            ]),
            FakeStorage::default().with_template(),
            FakeModels::default(),
        );

        let summary = process_ledger(&harness.services(), &settings(), &job())
            .await
            .unwrap();

        assert_eq!(summary.evaluated, 1);
        assert_eq!(harness.models.calls().len(), 1);
        let grid = harness.sheets.tab(WORKBOOK, "LEDGER");
        assert_eq!(grid[2][2], "First");
        assert_eq!(grid[2][5], "X");
    }

    #[tokio::test]
    async fn interrupted_pass_keeps_completed_questions() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Arc::new(LocalWorkspace::new(
            dir.path().join("outputs"),
            dir.path().join("downloads"),
        ));
        let harness = Harness::new(
            workbook(&[
                &["", "1", "First", "TEST_PRESENT", "", ""],
                &["", "2", "Second", "TEST_PRESENT", "", ""],
            ]),
            FakeStorage::default().with_template(),
            FakeModels::default(),
        );
        let mut services = harness.services();
        services.checkpoints = workspace.clone();

        // Question 2 lives on sheet row 4.
        harness.sheets.fail_writes_to_row(Some(4));
        let first = job();
        assert!(process_ledger(&services, &settings(), &first).await.is_err());

        let key = CheckpointKey::from_timestamp(first.timestamp);
        let saved = workspace.load(&key).await.unwrap().unwrap();
        assert!(saved.iter().find(|q| q.question_number.as_u64() == 1).unwrap().resolved);
        assert_eq!(harness.sheets.tab(WORKBOOK, "LEDGER")[2][5], "X");

        harness.sheets.fail_writes_to_row(None);
        let second = Job {
            template_file: TEMPLATE_NAME.into(),
            timestamp: Timestamp::parse_sheet("01/02/2030 10:00:00").unwrap(),
        };
        let summary = process_ledger(&services, &settings(), &second).await.unwrap();

        assert_eq!(
            summary,
            LedgerSummary {
                evaluated: 1,
                already_resolved: 1,
                ..Default::default()
            }
        );
        let prompts: Vec<String> = harness.models.calls().into_iter().map(|c| c.prompt).collect();
        assert_eq!(
            prompts,
            [
                "Answer tersely.\n\nFirst",
                "Answer tersely.\n\nSecond",
                "Answer tersely.\n\nSecond",
            ]
        );
        let grid = harness.sheets.tab(WORKBOOK, "LEDGER");
        assert_eq!(grid[3][5], "X");
        let resumed = CheckpointKey::from_timestamp(second.timestamp);
        assert!(workspace.checkpoint_path(&resumed).exists());
    }

    #[tokio::test]
    async fn unknown_presents_fall_back_to_the_default() {
        let harness = Harness::new(
            workbook(&[&["", "1", "What is X?", "NO_SUCH_PRESENT", "", ""]]),
            FakeStorage::default().with_template(),
            FakeModels::default(),
        );

        process_ledger(&harness.services(), &settings(), &job()).await.unwrap();

        let calls = harness.models.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gpt-4o");
    }

    #[tokio::test]
    async fn reload_requests_and_unnumbered_rows_are_skipped() {
        let harness = Harness::new(
            workbook(&[
                &["", "1", "Again please", "PRESENT_A", "X", ""],
                &["", "", "No number", "PRESENT_A", "", ""],
            ]),
            FakeStorage::default().with_template(),
            FakeModels::default(),
        );

        let summary = process_ledger(&harness.services(), &settings(), &job())
            .await
            .unwrap();

        assert_eq!(summary.skipped, 2);
        assert!(harness.models.calls().is_empty());
    }

    #[tokio::test]
    async fn a_failing_question_does_not_stop_the_pass() {
        let ambiguous = crate::fakes::grid(&[
            &["", "", "", "", "", ""],
            &["", "", "", "", "", ""],
            &["", "1", "Both", "raw", "Ask", "gpt-4o, claude-3-opus"],
            &["", "2", "One", "prior_single_output", "Use it", "gpt-4o"],
        ]);
        let sheets = workbook(&[
            &["", "1", "Breaks", "AMBIGUOUS", "", ""],
            &["", "2", "Works", "TEST_PRESENT", "", ""],
        ])
        .with_tab(WORKBOOK, "AMBIGUOUS", ambiguous);
        let harness = Harness::new(sheets, FakeStorage::default().with_template(), FakeModels::default());

        let summary = process_ledger(&harness.services(), &settings(), &job())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.evaluated, 1);
        let grid = harness.sheets.tab(WORKBOOK, "LEDGER");
        assert_eq!(grid[2][5], "");
        assert_eq!(grid[3][5], "X");
    }

    #[tokio::test]
    async fn resolved_questions_are_reported_when_a_document_is_set() {
        let harness = Harness::new(
            workbook(&[&["", "1", "What is X?", "TEST_PRESENT", "", ""]]),
            FakeStorage::default().with_template(),
            FakeModels::default().reply("gpt-4o", "X is 42."),
        );
        let mut settings = settings();
        settings.report_document = DocumentId::new("doc-1");

        process_ledger(&harness.services(), &settings, &job()).await.unwrap();

        let batches = harness.docs.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, "doc-1");
        assert_eq!(
            batches[0].1[0].text,
            "# Question 1: What is X?\n\n## Results from GPT\n\nX is 42.\n\n"
        );
    }

    #[tokio::test]
    async fn missing_template_fails_the_pass() {
        let harness = Harness::new(workbook(&[]), FakeStorage::default(), FakeModels::default());
        let err = process_ledger(&harness.services(), &settings(), &job())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::TemplateNotFound { .. }));
    }
}
