//! LLM-Plus entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** from flags and `LLMPLUS_*` environment variables.
//! 2. **Wire observability**: `tracing-subscriber` with a JSON (or text) layer
//!    and, when configured, an OpenTelemetry OTLP exporter. All spans and
//!    events emitted by every crate in the workspace flow through it.
//! 3. **Construct infrastructure**: the Google Sheets, Drive and Docs adapters,
//!    the model router with one provider per configured API key, and the
//!    local workspace for checkpoints and artefacts. These are injected into
//!    the [`nodes::Orchestrator`].
//! 4. **Run** the polling loop until Ctrl-C, or a single tick with `--once`.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use google::{GoogleClient, GoogleDocs, GoogleDrive, GoogleSheets, TokenProvider};
use llm::{AnthropicProvider, GeminiProvider, ModelRouter, OpenAiProvider, ProviderSettings};
use nodes::{Orchestrator, Services};
use pipeline::control_panel::{CellMap, SheetControlPanel};
use pipeline::ports::SpreadsheetService;
use storage::LocalWorkspace;
use tracing::{error, info, warn};

use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    let telemetry = telemetry::init(config.log_format, config.otlp_endpoint.as_deref())?;

    let result = run(config).await;
    if let Err(e) = &result {
        error!("llmplus stopped: {e:#}");
    }
    telemetry.shutdown();
    result
}

async fn run(config: CliConfig) -> anyhow::Result<()> {
    let settings = config.settings()?;
    let tokens = Arc::new(TokenProvider::new(config.token_source()?));
    let google = GoogleClient::new(config.google_config(), tokens)
        .context("failed to build the Google client")?;

    let sheets: Arc<dyn SpreadsheetService> = Arc::new(GoogleSheets::new(google.clone()));
    let workspace = Arc::new(LocalWorkspace::new(
        config.outputs_dir.clone(),
        config.downloads_dir.clone(),
    ));
    let services = Services {
        sheets: sheets.clone(),
        storage: Arc::new(GoogleDrive::new(google.clone())),
        documents: Arc::new(GoogleDocs::new(google)),
        models: Arc::new(model_router(&config)?),
        checkpoints: workspace.clone(),
        artifacts: workspace,
    };

    let panel = Arc::new(SheetControlPanel::new(
        sheets,
        config.control_spreadsheet()?,
        config.control_tab()?,
        CellMap::default(),
    ));
    let orchestrator = Orchestrator::new(panel, services, settings);

    if config.once {
        let outcome = orchestrator.tick().await?;
        info!(?outcome, "single tick complete");
        return Ok(());
    }

    tokio::select! {
        () = orchestrator.run() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}

/// One provider per model family with an API key.
fn model_router(config: &CliConfig) -> anyhow::Result<ModelRouter> {
    let provider = |key: &str, url: &str| {
        ProviderSettings::new(key, url).with_timeout(config.model_timeout())
    };

    let mut router = ModelRouter::new();
    if let Some(key) = &config.openai_api_key {
        router = router.with_provider(Arc::new(OpenAiProvider::openai(provider(
            key,
            &config.openai_base_url,
        ))?));
    }
    if let Some(key) = &config.anthropic_api_key {
        router = router.with_provider(Arc::new(AnthropicProvider::new(provider(
            key,
            &config.anthropic_base_url,
        ))?));
    }
    if let Some(key) = &config.gemini_api_key {
        router = router.with_provider(Arc::new(GeminiProvider::new(provider(
            key,
            &config.gemini_base_url,
        ))?));
    }
    if let Some(key) = &config.deepseek_api_key {
        router = router.with_provider(Arc::new(OpenAiProvider::deepseek(provider(
            key,
            &config.deepseek_base_url,
        ))?));
    }

    let families: Vec<String> = router.families().map(ToString::to_string).collect();
    if families.is_empty() {
        warn!("no model API keys configured, every model call will fail");
    } else {
        info!(?families, "model providers configured");
    }
    Ok(router)
}
