use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::checkpoint::{CheckpointError, CheckpointKey, CheckpointStore};
use pipeline::ports::ArtifactStore;
use pipeline::{Question, ServiceError, ServiceKind};
use tokio::fs;
use tracing::{debug, info};

/// File name of the saved ingestion output inside the outputs directory.
pub const INGESTION_OUTPUT_FILE: &str = "model_output.json";

/// Replaces characters that are unsafe in file names with `_`.
///
/// Covers the characters Windows rejects, path separators, and the narrow
/// no-break space (U+202F) that some scanners put in generated names.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '\u{202f}' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "upload".to_string(),
        _ => cleaned,
    }
}

/// Outputs and downloads directories on the local disk.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    outputs_dir: PathBuf,
    downloads_dir: PathBuf,
}

impl LocalWorkspace {
    pub fn new(outputs_dir: impl Into<PathBuf>, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Path of the checkpoint file for `key`.
    pub fn checkpoint_path(&self, key: &CheckpointKey) -> PathBuf {
        self.outputs_dir.join(key.file_name())
    }
}

/// Writes `bytes` to `dest` through a temporary sibling and a rename.
async fn write_atomic(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).await?;
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("artifact");
    let tmp_path = parent.join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, bytes).await?;
    fs::rename(&tmp_path, dest).await
}

fn io_error(path: &Path, error: std::io::Error) -> ServiceError {
    ServiceError::Io {
        service: ServiceKind::Workspace,
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

#[async_trait]
impl CheckpointStore for LocalWorkspace {
    async fn load(&self, key: &CheckpointKey) -> Result<Option<Vec<Question>>, CheckpointError> {
        let path = self.checkpoint_path(key);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Read {
                    key: key.to_string(),
                    message: format!("{}: {e}", path.display()),
                })
            }
        };
        let questions = serde_json::from_str(&text).map_err(|e| CheckpointError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(questions))
    }

    async fn save(
        &self,
        key: &CheckpointKey,
        questions: &[Question],
    ) -> Result<(), CheckpointError> {
        let write_error = |message: String| CheckpointError::Write {
            key: key.to_string(),
            message,
        };
        let json = serde_json::to_string_pretty(questions).map_err(|e| write_error(e.to_string()))?;
        let path = self.checkpoint_path(key);
        write_atomic(&path, json.as_bytes())
            .await
            .map_err(|e| write_error(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), questions = questions.len(), "checkpoint saved");
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalWorkspace {
    async fn save_upload(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ServiceError> {
        let path = self.downloads_dir.join(sanitize_file_name(name));
        write_atomic(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "upload saved");
        Ok(path)
    }

    async fn save_ingestion_output(&self, json: &str) -> Result<PathBuf, ServiceError> {
        let path = self.outputs_dir.join(INGESTION_OUTPUT_FILE);
        write_atomic(&path, json.as_bytes())
            .await
            .map_err(|e| io_error(&path, e))?;
        info!(path = %path.display(), "ingestion output saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::checkpoint::upsert_question;
    use pipeline::{ModelKey, QuestionNumber, StepResult};

    fn workspace(dir: &tempfile::TempDir) -> LocalWorkspace {
        LocalWorkspace::new(dir.path().join("outputs"), dir.path().join("downloads"))
    }

    fn key() -> CheckpointKey {
        CheckpointKey::from_sheet_value("01/02/2025 03:04:05").unwrap()
    }

    fn question(number: u64) -> Question {
        Question {
            question_number: QuestionNumber::new(number),
            text: format!("Q{number}"),
            present_name: "PRESENT_A".into(),
            reload_requested: false,
            resolved: false,
            model_outputs: Vec::new(),
        }
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d*e?.pdf"), "a_b_c_d_e_.pdf");
        assert_eq!(sanitize_file_name("scan\u{202f}1.png"), "scan_1.png");
        assert_eq!(sanitize_file_name("  "), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[tokio::test]
    async fn missing_checkpoint_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(workspace(&dir).load(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_survives_a_fresh_workspace_instance() {
        let dir = tempfile::tempdir().unwrap();
        let store = workspace(&dir);
        store.save(&key(), &[question(1), question(2)]).await.unwrap();

        let mut done = question(2);
        done.resolved = true;
        let mut step = StepResult::new();
        step.insert(ModelKey::GPT, "answer");
        done.model_outputs.push(step);
        upsert_question(&store, &key(), &done).await.unwrap();

        let reopened = workspace(&dir);
        let loaded = reopened.load(&key()).await.unwrap().unwrap();
        assert_eq!(loaded, vec![question(1), done]);

        let path = reopened.checkpoint_path(&key());
        assert!(path.ends_with("outputs/20250102_030405.json"));
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn checkpoint_file_uses_question_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = workspace(&dir);
        store.save(&key(), &[question(3)]).await.unwrap();

        let text = std::fs::read_to_string(store.checkpoint_path(&key())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["question_number"], 3);
        assert_eq!(value[0]["present"], "PRESENT_A");
        assert_eq!(value[0]["reload_question"], false);
    }

    #[tokio::test]
    async fn corrupt_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = workspace(&dir);
        let path = store.checkpoint_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = store.load(&key()).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn uploads_are_saved_under_sanitised_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = workspace(&dir);

        let path = store.save_upload("invoice:march.pdf", b"%PDF-1.7").await.unwrap();

        assert_eq!(path, dir.path().join("downloads").join("invoice_march.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn ingestion_output_goes_to_the_outputs_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = workspace(&dir);

        let path = store.save_ingestion_output(r#"{"q1":{}}"#).await.unwrap();

        assert!(path.ends_with(INGESTION_OUTPUT_FILE));
        assert_eq!(std::fs::read_to_string(path).unwrap(), r#"{"q1":{}}"#);
    }
}
