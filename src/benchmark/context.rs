//! Persisted sweep context.
//!
//! The context is rewritten at every state transition so an operator (or a
//! restarted process) can see exactly where a sweep is or where it stopped.

use crate::error::{TriageError, TriageResult};
use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Current value of a swept parameter and its upper bound, serialized as `"cur/sup"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SweepPosition {
    pub current: u64,
    pub sup: u64,
}

impl SweepPosition {
    pub fn new(current: u64, sup: u64) -> Self {
        Self { current, sup }
    }
}

impl fmt::Display for SweepPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.current, self.sup)
    }
}

impl From<SweepPosition> for String {
    fn from(position: SweepPosition) -> Self {
        position.to_string()
    }
}

impl TryFrom<String> for SweepPosition {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (current, sup) = value
            .split_once('/')
            .ok_or_else(|| format!("expected 'current/sup', got '{value}'"))?;
        Ok(Self {
            current: current.trim().parse().map_err(|e| format!("bad current value: {e}"))?,
            sup: sup.trim().parse().map_err(|e| format!("bad upper bound: {e}"))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkStatus {
    Idle,
    Running,
    Polling,
    Aborted,
    Error,
    Completed,
}

impl BenchmarkStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BenchmarkStatus::Aborted | BenchmarkStatus::Error | BenchmarkStatus::Completed
        )
    }
}

impl fmt::Display for BenchmarkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BenchmarkStatus::Idle => "idle",
            BenchmarkStatus::Running => "running",
            BenchmarkStatus::Polling => "polling",
            BenchmarkStatus::Aborted => "aborted",
            BenchmarkStatus::Error => "error",
            BenchmarkStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// How a single grid point ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    TimedOut,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub batch_size: u64,
    pub concurrency: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_sec: f64,
    pub outcome: RunOutcome,
    pub poll_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkContext {
    pub dataset_name: String,
    pub total_rows: u64,
    pub batch_size: SweepPosition,
    pub batch_size_step: u64,
    pub concurrency: SweepPosition,
    pub concurrency_step: u64,
    /// Last action taken against the pipeline (`apply_settings`, `analyze`, `poll_status`)
    pub last_action: Option<String>,
    pub status: BenchmarkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub runs: Vec<RunRecord>,
    pub last_updated: DateTime<Utc>,
}

impl BenchmarkContext {
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// File-backed context with an in-memory copy for cheap status reads
#[derive(Debug)]
pub struct ContextStore {
    path: PathBuf,
    current: RwLock<Option<BenchmarkContext>>,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Option<BenchmarkContext> {
        self.current.read().clone()
    }

    /// Adopt the context left on disk by a previous process, if any
    pub async fn load(&self) -> TriageResult<Option<BenchmarkContext>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(self.path.display().to_string(), e).into()),
        };
        let context: BenchmarkContext = serde_json::from_slice(&data)?;
        *self.current.write() = Some(context.clone());
        Ok(Some(context))
    }

    /// Write `context` to disk (temp file + rename) and make it current
    pub async fn persist(&self, context: &BenchmarkContext) -> TriageResult<()> {
        let data = serde_json::to_vec_pretty(context)?;
        let io_err = |e: std::io::Error| -> TriageError {
            StorageError::io(self.path.display().to_string(), e).into()
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        tokio::fs::write(&temp, data).await.map_err(io_err)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(io_err)?;

        *self.current.write() = Some(context.clone());
        Ok(())
    }
}
