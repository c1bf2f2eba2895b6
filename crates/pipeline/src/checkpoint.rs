//! Checkpoint store: the durable, restart-safe set of questions for one run.
//!
//! A checkpoint is addressed by a [`CheckpointKey`] derived from the run
//! timestamp. It is written wholesale once, when a fresh ledger grid is
//! decoded ([`checkpoint_ledger`]), and afterwards only through
//! [`upsert_question`], one completed question at a time. After a crash the
//! last fully written checkpoint is the source of truth.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ledger::decode_ledger;
use crate::{Grid, Question, Timestamp};

/// Filesystem-safe encoding of a run timestamp, `YYYYMMDD_HHMMSS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey(String);

impl CheckpointKey {
    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        Self(timestamp.as_datetime().format("%Y%m%d_%H%M%S").to_string())
    }

    /// Derives a key from a spreadsheet date-time cell
    /// (`MM/DD/YYYY HH:MM:SS`).
    pub fn from_sheet_value(value: &str) -> Option<Self> {
        Timestamp::parse_sheet(value).map(Self::from_timestamp)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the file holding this checkpoint.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl std::fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint {key}: {message}")]
    Read { key: String, message: String },

    #[error("failed to write checkpoint {key}: {message}")]
    Write { key: String, message: String },

    #[error("checkpoint {key} is not a valid question list: {message}")]
    Corrupt { key: String, message: String },
}

/// Durable storage of checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads a checkpoint, or `None` if none was written under `key`.
    async fn load(&self, key: &CheckpointKey) -> Result<Option<Vec<Question>>, CheckpointError>;

    /// Replaces the checkpoint under `key`. Must be atomic: a reader sees
    /// either the previous list or the new one.
    async fn save(&self, key: &CheckpointKey, questions: &[Question])
        -> Result<(), CheckpointError>;
}

/// Decodes a ledger grid and writes it as the checkpoint for `key`,
/// replacing any earlier checkpoint under that key.
///
/// Question numbers are unique in a checkpoint: when several rows carry the
/// same number only the first is kept.
pub async fn checkpoint_ledger(
    store: &dyn CheckpointStore,
    key: &CheckpointKey,
    grid: &Grid,
) -> Result<Vec<Question>, CheckpointError> {
    let mut seen = HashSet::new();
    let questions: Vec<Question> = decode_ledger(grid)
        .into_iter()
        .filter(|q| {
            let first = seen.insert(q.question_number);
            if !first && !q.question_number.is_unassigned() {
                warn!(
                    question = %q.question_number,
                    text = %q.text,
                    "duplicate question number, keeping the first row"
                );
            }
            first
        })
        .collect();
    store.save(key, &questions).await?;
    debug!(checkpoint = %key, questions = questions.len(), "ledger checkpointed");
    Ok(questions)
}

/// Inserts or replaces `question` (matched by number) in the checkpoint for
/// `key`, keeping the list sorted by ascending number.
///
/// Repeating the same upsert leaves the checkpoint unchanged.
pub async fn upsert_question(
    store: &dyn CheckpointStore,
    key: &CheckpointKey,
    question: &Question,
) -> Result<(), CheckpointError> {
    let mut questions = store.load(key).await?.unwrap_or_default();
    match questions
        .iter_mut()
        .find(|q| q.question_number == question.question_number)
    {
        Some(existing) => *existing = question.clone(),
        None => questions.push(question.clone()),
    }
    questions.sort_by_key(|q| q.question_number);
    store.save(key, &questions).await
}

/// In-memory [`CheckpointStore`]. Does not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<CheckpointKey, Vec<Question>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &CheckpointKey) -> Result<Option<Vec<Question>>, CheckpointError> {
        let checkpoints = self.checkpoints.lock().map_err(|e| CheckpointError::Read {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(checkpoints.get(key).cloned())
    }

    async fn save(
        &self,
        key: &CheckpointKey,
        questions: &[Question],
    ) -> Result<(), CheckpointError> {
        let mut checkpoints = self.checkpoints.lock().map_err(|e| CheckpointError::Write {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        checkpoints.insert(key.clone(), questions.to_vec());
        Ok(())
    }
}
