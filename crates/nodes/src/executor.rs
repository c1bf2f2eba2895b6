//! The polling loop: dispatch, run the handler, signal, sleep, repeat.

use std::sync::Arc;

use pipeline::checkpoint::CheckpointStore;
use pipeline::control_panel::{CoordinationPort, PanelError};
use pipeline::ports::{ArtifactStore, CloudStorage, DocumentService, ModelService, SpreadsheetService};
use pipeline::{OrchestratorError, RunId};
use tracing::{error, info, info_span, warn, Instrument};

use crate::dispatcher::{dispatch, RunState};
use crate::ledger::process_ledger;
use crate::settings::OrchestratorSettings;
use crate::uploads::{process_uploads, wait_for_uploads};

/// The ports every handler may use.
#[derive(Clone)]
pub struct Services {
    pub sheets: Arc<dyn SpreadsheetService>,
    pub storage: Arc<dyn CloudStorage>,
    pub documents: Arc<dyn DocumentService>,
    pub models: Arc<dyn ModelService>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was requested.
    Idle,
    /// A handler ran; `succeeded` is false when it returned an error.
    Handled { state: &'static str, succeeded: bool },
}

pub struct Orchestrator {
    panel: Arc<dyn CoordinationPort>,
    services: Services,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        panel: Arc<dyn CoordinationPort>,
        services: Services,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            panel,
            services,
            settings,
        }
    }

    /// Runs one dispatch and, unless idle, its handler.
    ///
    /// Handler failures are logged and reported as unsuccessful; the panel is
    /// signalled either way so the operator can request the next run. Only a
    /// panel that cannot be read or interpreted is an error.
    pub async fn tick(&self) -> Result<TickOutcome, PanelError> {
        let state = dispatch(self.panel.as_ref()).await?;
        if state.is_waiting() {
            return Ok(TickOutcome::Idle);
        }

        let run_id = RunId::new_random();
        let span = info_span!("run", %run_id, state = state.name());
        let result = self.handle(&state).instrument(span.clone()).await;
        let succeeded = result.is_ok();

        async {
            if let Err(e) = result {
                error!(error = %e, "run failed");
            }
            if let Err(e) = self.panel.signal_done().await {
                warn!(error = %e, "could not mark the run finished");
            }
        }
        .instrument(span)
        .await;
        Ok(TickOutcome::Handled {
            state: state.name(),
            succeeded,
        })
    }

    async fn handle(&self, state: &RunState) -> Result<(), OrchestratorError> {
        let (services, settings) = (&self.services, &self.settings);
        match state {
            RunState::Waiting => {}
            RunState::ProcessLedger(job) => {
                let summary = process_ledger(services, settings, job).await?;
                info!(?summary, "ledger run complete");
            }
            RunState::ProcessUploads(job) => {
                let summary = process_uploads(services, settings, job).await?;
                info!(?summary, "upload run complete");
            }
            RunState::WaitForUploads { job, duration } => {
                match wait_for_uploads(services, settings, job, *duration).await? {
                    Some(summary) => info!(?summary, "upload run complete"),
                    None => info!("wait for uploads timed out"),
                }
            }
        }
        Ok(())
    }

    /// Ticks forever, sleeping the poll interval between ticks and the idle
    /// backoff whenever there was nothing to do.
    pub async fn run(&self) {
        info!(
            poll_ms = self.settings.poll_interval.as_millis() as u64,
            idle_ms = self.settings.idle_backoff.as_millis() as u64,
            "polling control panel"
        );
        loop {
            match self.tick().await {
                Ok(TickOutcome::Handled { .. }) => {}
                Ok(TickOutcome::Idle) => tokio::time::sleep(self.settings.idle_backoff).await,
                Err(e) => {
                    error!(error = %e, "control panel could not be read");
                    tokio::time::sleep(self.settings.idle_backoff).await;
                }
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
