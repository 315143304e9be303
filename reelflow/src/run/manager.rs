//! Top-level entry point: creates, executes, resumes, and cancels runs.

use super::record::{load_record, run_dir, save_record, RunRecord, RunResult, RunStatus};
use super::{RunId, StageFailure};
use crate::artifact::ArtifactStore;
use crate::audit::AuditLog;
use crate::config::ConfigResolver;
use crate::errors::{ReelflowError, Result};
use crate::stage::{CollaboratorRegistry, StageExecutor, PIPELINE};
use crate::util::iso_timestamp;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Wires the config resolver, seed manager, artifact store, and stage
/// executor together for each run.
///
/// Multiple managers (or processes) may execute different runs
/// concurrently: each run owns an exclusive directory keyed by its id, so
/// no coordination beyond that is needed.
#[derive(Debug, Clone)]
pub struct RunManager {
    resolver: ConfigResolver,
    runs_root: PathBuf,
    registry: Arc<CollaboratorRegistry>,
}

impl RunManager {
    /// Creates a manager over a config root, a runs root, and the
    /// collaborator wiring.
    #[must_use]
    pub fn new(
        resolver: ConfigResolver,
        runs_root: impl AsRef<std::path::Path>,
        registry: Arc<CollaboratorRegistry>,
    ) -> Self {
        Self {
            resolver,
            runs_root: runs_root.as_ref().to_path_buf(),
            registry,
        }
    }

    /// Returns the runs root directory.
    #[must_use]
    pub fn runs_root(&self) -> &PathBuf {
        &self.runs_root
    }

    /// Allocates a run for a channel and persists its record before any
    /// stage executes.
    ///
    /// Config resolution happens here so a bad config fails the run before
    /// it exists. Without an explicit master seed a random one is drawn
    /// and recorded; either way every later stochastic decision derives
    /// from the recorded value.
    pub fn create_run(&self, channel: &str, master_seed: Option<u64>) -> Result<RunRecord> {
        // Fail loudly and early on a bad config.
        let _config = self.resolver.resolve(channel)?;

        let run_id = RunId::generate();
        let master_seed = master_seed.unwrap_or_else(rand::random);
        let record = RunRecord::new(run_id.clone(), channel, master_seed);
        save_record(&self.runs_root, &record)?;

        let audit = AuditLog::open(&run_dir(&self.runs_root, &run_id), run_id.as_str())?;
        audit.record(
            "run.created",
            json!({ "channel": channel, "master_seed": master_seed }),
        )?;

        info!(run_id = %run_id, channel, "created run");
        Ok(record)
    }

    /// Executes (or resumes) a run to a terminal state.
    ///
    /// Re-invoking a run already in `Succeeded` status is a no-op that
    /// returns the existing result without calling any collaborator or
    /// writing new artifact versions. A `Failed` run resumes at the first
    /// stage with missing outputs.
    pub async fn execute_run(&self, run_id: &RunId) -> Result<RunResult> {
        let mut record = load_record(&self.runs_root, run_id)?;

        if record.status == RunStatus::Succeeded {
            info!(run_id = %run_id, "run already succeeded; returning existing result");
            return Ok(record.result());
        }

        let config = self.resolver.resolve(&record.channel)?;
        let dir = run_dir(&self.runs_root, run_id);
        let audit = AuditLog::open(&dir, run_id.as_str())?;

        if record.status == RunStatus::Failed {
            audit.record(
                "run.resumed",
                json!({ "previous_failure": record.failure }),
            )?;
            record.failure = None;
            record.cancel_requested = false;
            record.finished_at = None;
        }

        let store = ArtifactStore::open(&dir, run_id.as_str())?;
        let seeds = crate::seed::SeedManager::open(&dir, run_id.as_str(), record.master_seed)?;

        let executor = StageExecutor::new(
            self.runs_root.clone(),
            record,
            config,
            Arc::clone(&self.registry),
            store,
            seeds,
            audit,
        );
        let record = executor.execute().await?;
        Ok(record.result())
    }

    /// Requests cancellation of a run between stages.
    ///
    /// A pending run fails immediately; a running run fails at the next
    /// stage boundary (never mid-stage-write). Returns false if the run is
    /// already terminal.
    pub fn cancel_run(&self, run_id: &RunId, reason: &str) -> Result<bool> {
        let mut record = load_record(&self.runs_root, run_id)?;
        if record.status.is_terminal() {
            return Ok(false);
        }

        let dir = run_dir(&self.runs_root, run_id);
        let audit = AuditLog::open(&dir, run_id.as_str())?;

        if record.status == RunStatus::Pending {
            let stage_index = record.current_stage;
            let stage = PIPELINE
                .get(stage_index)
                .map_or("idea", |s| s.name)
                .to_string();
            let err = ReelflowError::Cancelled {
                reason: reason.to_string(),
            };
            record.status = RunStatus::Failed;
            record.failure = Some(StageFailure {
                stage_index,
                stage,
                kind: err.kind().to_string(),
                reason: err.to_string(),
            });
            record.finished_at = Some(iso_timestamp());
            save_record(&self.runs_root, &record)?;
            audit.record("run.finalized", json!({ "status": "failed", "kind": "cancelled" }))?;
        } else {
            record.cancel_requested = true;
            save_record(&self.runs_root, &record)?;
            audit.record("run.cancel_requested", json!({ "reason": reason }))?;
        }
        Ok(true)
    }

    /// Lists the run ids under the runs root, oldest first (run ids sort
    /// by creation time).
    pub fn list_runs(&self) -> Result<Vec<RunId>> {
        let mut ids = Vec::new();
        if !self.runs_root.is_dir() {
            return Ok(ids);
        }
        for entry in std::fs::read_dir(&self.runs_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(RunId::from_string(name));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
