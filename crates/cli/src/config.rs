//! Command-line and environment configuration.
//!
//! Every flag can also be supplied through an `LLMPLUS_*` environment
//! variable, so the binary can run unattended from a service manager.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use google::{GoogleConfig, TokenSource};
use llm::anthropic::ANTHROPIC_URL;
use llm::gemini::GEMINI_URL;
use llm::openai::{DEEPSEEK_URL, OPENAI_URL};
use nodes::settings::{
    OrchestratorSettings, DEFAULT_CONTROL_TAB, DEFAULT_CV_PRESENT, DEFAULT_LEDGER_TAB,
    DEFAULT_PRESENT,
};
use pipeline::{DocumentId, FolderId, SpreadsheetId, TabName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "llmplus", version, about = "Runs LLM-Plus presents over a spreadsheet ledger")]
pub struct CliConfig {
    // ---- Control panel and workbook layout ----
    #[arg(long, env = "LLMPLUS_CONTROL_SHEET_ID")]
    pub control_sheet_id: String,

    #[arg(long, env = "LLMPLUS_CONTROL_TAB", default_value = DEFAULT_CONTROL_TAB)]
    pub control_tab: String,

    #[arg(long, env = "LLMPLUS_LEDGER_TAB", default_value = DEFAULT_LEDGER_TAB)]
    pub ledger_tab: String,

    #[arg(long, env = "LLMPLUS_CV_PRESENT", default_value = DEFAULT_CV_PRESENT)]
    pub cv_present: String,

    #[arg(long, env = "LLMPLUS_DEFAULT_PRESENT", default_value = DEFAULT_PRESENT)]
    pub default_present: String,

    // ---- Drive folders and report document ----
    #[arg(long, env = "LLMPLUS_UPLOADS_FOLDER_ID")]
    pub uploads_folder_id: String,

    #[arg(long, env = "LLMPLUS_ARCHIVE_FOLDER_ID")]
    pub archive_folder_id: String,

    #[arg(long, env = "LLMPLUS_TEMPLATES_FOLDER_ID")]
    pub templates_folder_id: String,

    /// Document that receives the outputs of resolved questions.
    #[arg(long, env = "LLMPLUS_REPORT_DOCUMENT_ID")]
    pub report_document_id: Option<String>,

    // ---- Local directories ----
    #[arg(long, env = "LLMPLUS_DOWNLOADS_DIR", default_value = "downloads")]
    pub downloads_dir: PathBuf,

    /// Checkpoints and ingestion output.
    #[arg(long, env = "LLMPLUS_OUTPUTS_DIR", default_value = "outputs")]
    pub outputs_dir: PathBuf,

    // ---- Timing ----
    #[arg(long, env = "LLMPLUS_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "LLMPLUS_IDLE_BACKOFF_SECS", default_value_t = 10)]
    pub idle_backoff_secs: u64,

    #[arg(long, env = "LLMPLUS_UPLOAD_POLL_SECS", default_value_t = 30)]
    pub upload_poll_secs: u64,

    // ---- Google credentials ----
    /// Access token for the Google APIs.
    #[arg(long, env = "LLMPLUS_GOOGLE_TOKEN", hide_env_values = true)]
    pub google_token: Option<String>,

    /// File holding the access token; re-read on reauthentication.
    #[arg(long, env = "LLMPLUS_GOOGLE_TOKEN_FILE", conflicts_with = "google_token")]
    pub google_token_file: Option<PathBuf>,

    #[arg(long, env = "LLMPLUS_GOOGLE_TIMEOUT_SECS", default_value_t = 60)]
    pub google_timeout_secs: u64,

    // ---- Model providers ----
    #[arg(long, env = "LLMPLUS_OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "LLMPLUS_OPENAI_BASE_URL", default_value = OPENAI_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "LLMPLUS_ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "LLMPLUS_ANTHROPIC_BASE_URL", default_value = ANTHROPIC_URL)]
    pub anthropic_base_url: String,

    #[arg(long, env = "LLMPLUS_GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "LLMPLUS_GEMINI_BASE_URL", default_value = GEMINI_URL)]
    pub gemini_base_url: String,

    #[arg(long, env = "LLMPLUS_DEEPSEEK_API_KEY", hide_env_values = true)]
    pub deepseek_api_key: Option<String>,

    #[arg(long, env = "LLMPLUS_DEEPSEEK_BASE_URL", default_value = DEEPSEEK_URL)]
    pub deepseek_base_url: String,

    #[arg(long, env = "LLMPLUS_MODEL_TIMEOUT_SECS", default_value_t = 300)]
    pub model_timeout_secs: u64,

    // ---- Observability ----
    #[arg(long, env = "LLMPLUS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// OTLP/gRPC collector endpoint; spans are exported when set.
    #[arg(long, env = "LLMPLUS_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Run a single tick and exit.
    #[arg(long)]
    pub once: bool,
}

fn required<T>(value: &str, flag: &str, make: fn(String) -> Option<T>) -> anyhow::Result<T> {
    make(value.to_string()).with_context(|| format!("--{flag} must not be blank"))
}

impl CliConfig {
    pub fn control_spreadsheet(&self) -> anyhow::Result<SpreadsheetId> {
        required(&self.control_sheet_id, "control-sheet-id", SpreadsheetId::new)
    }

    pub fn control_tab(&self) -> anyhow::Result<TabName> {
        required(&self.control_tab, "control-tab", TabName::new)
    }

    pub fn settings(&self) -> anyhow::Result<OrchestratorSettings> {
        Ok(OrchestratorSettings {
            ledger_tab: required(&self.ledger_tab, "ledger-tab", TabName::new)?,
            cv_present: required(&self.cv_present, "cv-present", TabName::new)?,
            default_present: self.default_present.trim().to_string(),
            uploads_folder: required(&self.uploads_folder_id, "uploads-folder-id", FolderId::new)?,
            archive_folder: required(&self.archive_folder_id, "archive-folder-id", FolderId::new)?,
            templates_folder: required(
                &self.templates_folder_id,
                "templates-folder-id",
                FolderId::new,
            )?,
            report_document: self.report_document_id.clone().and_then(DocumentId::new),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            idle_backoff: Duration::from_secs(self.idle_backoff_secs),
            upload_poll_interval: Duration::from_secs(self.upload_poll_secs),
        })
    }

    pub fn token_source(&self) -> anyhow::Result<TokenSource> {
        match (&self.google_token_file, &self.google_token) {
            (Some(path), _) => Ok(TokenSource::File(path.clone())),
            (None, Some(token)) => Ok(TokenSource::Static(token.clone())),
            (None, None) => bail!("either --google-token or --google-token-file is required"),
        }
    }

    pub fn google_config(&self) -> GoogleConfig {
        GoogleConfig {
            timeout: Duration::from_secs(self.google_timeout_secs),
            ..GoogleConfig::default()
        }
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "llmplus",
        "--control-sheet-id",
        "sheet-1",
        "--uploads-folder-id",
        "up",
        "--archive-folder-id",
        "arch",
        "--templates-folder-id",
        "tpl",
    ];

    fn parse(extra: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(REQUIRED.iter().chain(extra)).unwrap()
    }

    #[test]
    fn defaults_match_the_control_panel_layout() {
        let config = parse(&["--google-token", "t"]);
        let settings = config.settings().unwrap();

        assert_eq!(config.control_tab().unwrap().as_str(), "CONTROL_PANEL");
        assert_eq!(settings.ledger_tab.as_str(), "LEDGER");
        assert_eq!(settings.cv_present.as_str(), "CV_PRESENT");
        assert_eq!(settings.default_present, "TEST_PRESENT");
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.idle_backoff, Duration::from_secs(10));
        assert_eq!(settings.report_document, None);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.once);
    }

    #[test]
    fn token_file_takes_the_file_source() {
        let config = parse(&["--google-token-file", "/run/token"]);
        assert_eq!(
            config.token_source().unwrap(),
            TokenSource::File(PathBuf::from("/run/token"))
        );
    }

    #[test]
    fn blank_ids_are_rejected() {
        let config = CliConfig::try_parse_from([
            "llmplus",
            "--control-sheet-id",
            " ",
            "--uploads-folder-id",
            "up",
            "--archive-folder-id",
            "arch",
            "--templates-folder-id",
            "tpl",
        ])
        .unwrap();
        let err = config.control_spreadsheet().unwrap_err();
        assert_eq!(err.to_string(), "--control-sheet-id must not be blank");
    }

    #[test]
    fn missing_required_flags_fail_to_parse() {
        assert!(CliConfig::try_parse_from(["llmplus", "--once"]).is_err());
    }
}
