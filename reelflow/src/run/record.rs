//! Persisted run state.

use super::RunId;
use crate::errors::{ReelflowError, Result};
use crate::util::{iso_timestamp, write_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const RECORD_FILE: &str = "run.json";

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, no stage has executed yet.
    Pending,
    /// The stage executor is working through the sequence.
    Running,
    /// Every stage completed.
    Succeeded,
    /// A stage failed or the run was cancelled.
    Failed,
}

impl RunStatus {
    /// Returns true for terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Where and why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Ordinal of the failing stage.
    pub stage_index: usize,
    /// Name of the failing stage.
    pub stage: String,
    /// Machine-readable failure kind (error taxonomy).
    pub kind: String,
    /// Human-readable reason.
    pub reason: String,
}

/// The persisted record of one run. Owned exclusively by the run manager;
/// terminal transitions happen exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run id.
    pub run_id: RunId,
    /// The channel this run produces for.
    pub channel: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// Index of the stage currently (or next) executing.
    pub current_stage: usize,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Master seed all per-stage seeds derive from.
    pub master_seed: u64,
    /// Set by `cancel_run`; the executor checks it between stages.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Failure details once the run is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
    /// RFC3339 timestamp of the terminal transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl RunRecord {
    /// Creates a fresh pending record.
    #[must_use]
    pub fn new(run_id: RunId, channel: impl Into<String>, master_seed: u64) -> Self {
        Self {
            run_id,
            channel: channel.into(),
            created_at: iso_timestamp(),
            current_stage: 0,
            status: RunStatus::Pending,
            master_seed,
            cancel_requested: false,
            failure: None,
            finished_at: None,
        }
    }

    /// Snapshot of the outcome, returned to callers.
    #[must_use]
    pub fn result(&self) -> RunResult {
        RunResult {
            run_id: self.run_id.clone(),
            channel: self.channel.clone(),
            status: self.status,
            failure: self.failure.clone(),
        }
    }
}

/// The outcome of executing a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// The run id.
    pub run_id: RunId,
    /// The channel.
    pub channel: String,
    /// Terminal (or current) status.
    pub status: RunStatus,
    /// Failure details if the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

/// Path of a run's directory under the runs root.
#[must_use]
pub fn run_dir(runs_root: &Path, run_id: &RunId) -> PathBuf {
    runs_root.join(run_id.as_str())
}

/// Loads a run record, failing with `RunNotFound` if it does not exist.
pub fn load_record(runs_root: &Path, run_id: &RunId) -> Result<RunRecord> {
    let path = run_dir(runs_root, run_id).join(RECORD_FILE);
    if !path.is_file() {
        return Err(ReelflowError::RunNotFound {
            run: run_id.to_string(),
        });
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Persists a run record atomically.
pub fn save_record(runs_root: &Path, record: &RunRecord) -> Result<()> {
    let path = run_dir(runs_root, &record.run_id).join(RECORD_FILE);
    write_atomic(&path, &serde_json::to_vec_pretty(record)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_roundtrip() {
        let dir = TempDir::new().unwrap();
        let record = RunRecord::new(RunId::from("run-1"), "facts_channel", 42);

        save_record(dir.path(), &record).unwrap();
        let loaded = load_record(dir.path(), &RunId::from("run-1")).unwrap();

        assert_eq!(loaded.channel, "facts_channel");
        assert_eq!(loaded.status, RunStatus::Pending);
        assert_eq!(loaded.master_seed, 42);
        assert!(!loaded.cancel_requested);
    }

    #[test]
    fn test_missing_record_is_run_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_record(dir.path(), &RunId::from("nope")).unwrap_err();
        assert!(matches!(err, ReelflowError::RunNotFound { .. }));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
    }
}
