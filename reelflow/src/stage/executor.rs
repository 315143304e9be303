//! The stage executor: drives the fixed stage sequence for one run.
//!
//! States: `NotStarted → Running(stage_index) → Succeeded | Failed`.
//! Stage *i+1* begins only once stage *i* has written all of its declared
//! output artifacts. On entry to a run with partial artifacts the executor
//! skips stages whose declared outputs already exist and resumes at the
//! first stage with missing outputs. The first failure halts the sequence;
//! there is no automatic retry at this level.

use super::{
    CollaboratorRegistry, CollaboratorRequest, CollaboratorResponse, StageDescriptor, StageRole,
    PIPELINE,
};
use crate::artifact::ArtifactStore;
use crate::audit::AuditLog;
use crate::config::ChannelConfig;
use crate::errors::{ReelflowError, Result};
use crate::idea::{self, IdeaCandidate};
use crate::run::{load_record, save_record, RunRecord, RunStatus, StageFailure};
use crate::seed::SeedManager;
use crate::util::iso_timestamp;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// The executor's position in the run lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    /// No stage has been entered yet.
    NotStarted,
    /// Executing the stage at this index.
    Running(usize),
    /// Every stage completed.
    Succeeded,
    /// Halted at a stage.
    Failed {
        /// Ordinal of the failing stage.
        stage_index: usize,
        /// Failure reason.
        reason: String,
    },
}

/// Executes the pipeline stage sequence for one run.
pub struct StageExecutor {
    runs_root: PathBuf,
    record: RunRecord,
    config: Arc<ChannelConfig>,
    registry: Arc<CollaboratorRegistry>,
    store: ArtifactStore,
    seeds: SeedManager,
    audit: AuditLog,
    state: ExecutorState,
}

impl StageExecutor {
    /// Wires an executor for a run. All collaborating components are
    /// run-scoped; nothing here is shared across runs.
    pub fn new(
        runs_root: PathBuf,
        record: RunRecord,
        config: Arc<ChannelConfig>,
        registry: Arc<CollaboratorRegistry>,
        store: ArtifactStore,
        seeds: SeedManager,
        audit: AuditLog,
    ) -> Self {
        Self {
            runs_root,
            record,
            config,
            registry,
            store,
            seeds,
            audit,
            state: ExecutorState::NotStarted,
        }
    }

    /// Returns the current executor state.
    #[must_use]
    pub fn state(&self) -> &ExecutorState {
        &self.state
    }

    /// Runs the stage sequence to a terminal state and returns the
    /// finalized run record.
    ///
    /// Stage failures are captured into the record as `Failed`; an `Err`
    /// from this method means the engine itself could not persist run
    /// state.
    pub async fn execute(mut self) -> Result<RunRecord> {
        self.record.status = RunStatus::Running;
        save_record(&self.runs_root, &self.record)?;

        // Candidates never touch the artifact store; they live only across
        // the idea -> selection boundary.
        let mut candidates: Option<Vec<IdeaCandidate>> = None;

        for stage in PIPELINE {
            if let Some(reason) = self.cancel_requested()? {
                return self.finalize_failure(
                    stage,
                    &ReelflowError::Cancelled { reason },
                );
            }

            if self.stage_complete(stage)? {
                self.audit.record_stage(
                    stage.name,
                    "stage.skipped",
                    json!({ "reason": "outputs already present" }),
                )?;
                info!(stage = stage.name, "skipping stage with existing outputs");
                continue;
            }

            self.state = ExecutorState::Running(stage.ordinal);
            self.record.current_stage = stage.ordinal;
            save_record(&self.runs_root, &self.record)?;
            self.audit
                .record_stage(stage.name, "stage.started", json!({}))?;

            let started = Instant::now();
            let outcome = match stage.role {
                StageRole::IdeaGeneration => match self.run_idea_generation(stage).await {
                    Ok(generated) => {
                        candidates = Some(generated);
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                StageRole::IdeaSelection => self.run_selection(stage, candidates.take()),
                StageRole::Collaborate => self.run_collaborate(stage).await,
            };
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(()) => {
                    self.audit.record_stage(
                        stage.name,
                        "stage.completed",
                        json!({ "duration_ms": duration_ms }),
                    )?;
                    info!(stage = stage.name, duration_ms, "stage completed");
                }
                Err(e) => {
                    self.audit.record_stage(
                        stage.name,
                        "stage.failed",
                        json!({
                            "kind": e.kind(),
                            "reason": e.to_string(),
                            "duration_ms": duration_ms,
                        }),
                    )?;
                    return self.finalize_failure(stage, &e);
                }
            }
        }

        self.state = ExecutorState::Succeeded;
        self.record.status = RunStatus::Succeeded;
        self.record.current_stage = PIPELINE.len();
        self.record.finished_at = Some(iso_timestamp());
        save_record(&self.runs_root, &self.record)?;
        self.audit
            .record("run.finalized", json!({ "status": "succeeded" }))?;
        Ok(self.record)
    }

    /// Re-reads the persisted record to pick up a cancellation requested
    /// by another process. Cancellation only takes effect between stages.
    fn cancel_requested(&self) -> Result<Option<String>> {
        let on_disk = load_record(&self.runs_root, &self.record.run_id)?;
        if on_disk.cancel_requested {
            Ok(Some("cancel requested".to_string()))
        } else {
            Ok(None)
        }
    }

    /// A stage is complete when all declared outputs exist. The idea stage
    /// declares none (candidates are ephemeral), so it is complete exactly
    /// when its consumer, the selection stage, is.
    fn stage_complete(&self, stage: &StageDescriptor) -> Result<bool> {
        let probe = if stage.outputs.is_empty() {
            match PIPELINE.get(stage.ordinal + 1) {
                Some(next) => next,
                None => return Ok(false),
            }
        } else {
            stage
        };

        for name in probe.outputs {
            if !self.store.exists(probe.name, name)? {
                return Ok(false);
            }
        }
        Ok(!probe.outputs.is_empty())
    }

    /// Issues the seed for a decision point, auditing first-time
    /// derivation.
    fn issue_seed(&self, stage: &str, purpose: &str) -> Result<u64> {
        let fresh = !self.seeds.recorded(stage, purpose);
        let seed = self.seeds.seed_for(stage, purpose)?;
        if fresh {
            self.audit.record_stage(
                stage,
                "seed.issued",
                json!({ "purpose": purpose, "seed": seed }),
            )?;
        }
        Ok(seed)
    }

    /// Generates idea candidates with parallel collaborator calls.
    /// Completion order cannot affect the outcome: candidates keep their
    /// generation index and selection removes order dependence anyway.
    async fn run_idea_generation(
        &self,
        stage: &StageDescriptor,
    ) -> Result<Vec<IdeaCandidate>> {
        let collaborator = self.lookup_collaborator(stage)?;
        let count = self.config.idea_candidates;

        let mut calls = Vec::with_capacity(count as usize);
        for index in 0..count {
            let seed = self.issue_seed(stage.name, &format!("candidate_{index}"))?;
            let request = CollaboratorRequest {
                run_id: self.record.run_id.to_string(),
                stage: stage.name.to_string(),
                config: Arc::clone(&self.config),
                seed,
                inputs: BTreeMap::new(),
                generation_index: Some(index),
            };
            let collaborator = Arc::clone(&collaborator);
            calls.push(async move { (index, collaborator.invoke(request).await) });
        }

        let mut candidates = Vec::with_capacity(count as usize);
        for (index, result) in futures::future::join_all(calls).await {
            let response = result
                .map_err(|e| ReelflowError::collaborator(stage.name, e.reason))?;
            let text = response
                .outputs
                .get("candidate")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| {
                    ReelflowError::collaborator(
                        stage.name,
                        format!("call {index} did not produce a 'candidate' string output"),
                    )
                })?;
            candidates.push(IdeaCandidate {
                text: text.to_string(),
                generation_index: index,
            });
        }
        candidates.sort_by_key(|c| c.generation_index);

        self.audit.record_stage(
            stage.name,
            "candidates.generated",
            json!({ "count": candidates.len() }),
        )?;
        Ok(candidates)
    }

    /// Scores, filters, and persists the winning idea. On `NoEligibleIdea`
    /// zero idea artifacts are written.
    fn run_selection(
        &self,
        stage: &StageDescriptor,
        candidates: Option<Vec<IdeaCandidate>>,
    ) -> Result<()> {
        let candidates = candidates.unwrap_or_default();
        let seed = self.issue_seed(stage.name, "shuffle")?;

        let (winner, scored) = idea::select(&candidates, &self.config, seed)?;
        let discarded = scored.iter().filter(|s| s.score.is_none()).count();
        let winner_score = scored
            .iter()
            .find(|s| s.candidate == winner)
            .and_then(|s| s.score);

        self.write_output(
            stage,
            "selected_idea",
            json!({
                "idea": winner.text,
                "generation_index": winner.generation_index,
                "score": winner_score,
            }),
        )?;

        self.audit.record_stage(
            stage.name,
            "idea.selected",
            json!({
                "generation_index": winner.generation_index,
                "score": winner_score,
                "considered": candidates.len(),
                "discarded": discarded,
            }),
        )?;
        Ok(())
    }

    /// Runs a plain collaborator stage: read declared inputs, invoke,
    /// persist declared outputs.
    async fn run_collaborate(&self, stage: &StageDescriptor) -> Result<()> {
        let collaborator = self.lookup_collaborator(stage)?;

        let mut inputs = BTreeMap::new();
        for (producer, name) in stage.inputs {
            // Missing input is fatal: it means a skipped dependency or a
            // corrupted store, never something to paper over.
            let payload = self.store.read_json(producer, name)?;
            inputs.insert((*name).to_string(), payload);
        }

        let seed = self.issue_seed(stage.name, "generation")?;
        let request = CollaboratorRequest {
            run_id: self.record.run_id.to_string(),
            stage: stage.name.to_string(),
            config: Arc::clone(&self.config),
            seed,
            inputs,
            generation_index: None,
        };

        let response: CollaboratorResponse = collaborator
            .invoke(request)
            .await
            .map_err(|e| ReelflowError::collaborator(stage.name, e.reason))?;

        for name in stage.outputs {
            let value = response.outputs.get(*name).ok_or_else(|| {
                ReelflowError::collaborator(
                    stage.name,
                    format!("declared output '{name}' missing from response"),
                )
            })?;
            self.write_output(stage, name, value.clone())?;
        }
        Ok(())
    }

    fn lookup_collaborator(
        &self,
        stage: &StageDescriptor,
    ) -> Result<Arc<dyn super::Collaborator>> {
        let key = stage.collaborator.ok_or_else(|| {
            ReelflowError::collaborator(stage.name, "stage declares no collaborator")
        })?;
        self.registry.get(key).ok_or_else(|| {
            ReelflowError::collaborator(stage.name, format!("no collaborator registered for '{key}'"))
        })
    }

    /// Wraps a stage output in the persisted envelope and writes it.
    fn write_output(
        &self,
        stage: &StageDescriptor,
        name: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let envelope = json!({
            "schema": { "name": name, "version": crate::SCHEMA_VERSION },
            "run_id": self.record.run_id.as_str(),
            "created_at": iso_timestamp(),
            "data": data,
        });
        self.store
            .write(stage.name, name, &serde_json::to_vec_pretty(&envelope)?)?;
        Ok(())
    }

    fn finalize_failure(
        mut self,
        stage: &StageDescriptor,
        err: &ReelflowError,
    ) -> Result<RunRecord> {
        let reason = err.to_string();
        if matches!(err, ReelflowError::Cancelled { .. }) {
            warn!(stage = stage.name, "run cancelled between stages");
        } else {
            error!(stage = stage.name, %reason, "run failed");
        }

        self.state = ExecutorState::Failed {
            stage_index: stage.ordinal,
            reason: reason.clone(),
        };
        self.record.status = RunStatus::Failed;
        self.record.current_stage = stage.ordinal;
        self.record.failure = Some(StageFailure {
            stage_index: stage.ordinal,
            stage: stage.name.to_string(),
            kind: err.kind().to_string(),
            reason,
        });
        self.record.finished_at = Some(iso_timestamp());
        save_record(&self.runs_root, &self.record)?;
        self.audit.record(
            "run.finalized",
            json!({
                "status": "failed",
                "stage": stage.name,
                "kind": err.kind(),
            }),
        )?;
        Ok(self.record)
    }
}
