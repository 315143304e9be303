//! End-to-end tests for run execution: determinism, resume, safety
//! constraints, and terminal-state handling.

#[cfg(test)]
mod tests {
    use crate::audit::AuditLog;
    use crate::config::ConfigResolver;
    use crate::errors::ReelflowError;
    use crate::run::{load_record, run_dir, RunId, RunManager, RunStatus};
    use crate::stage::{
        Collaborator, CollaboratorError, CollaboratorRegistry, CollaboratorRequest,
        CollaboratorResponse, StageRole, PIPELINE,
    };
    use crate::testing::{FailingCollaborator, ScriptedIdeaCollaborator, StubStageCollaborator};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::{Arc, OnceLock};
    use tempfile::TempDir;

    const CHANNEL: &str = "facts_channel";

    struct Harness {
        _root: TempDir,
        manager: RunManager,
        idea: Arc<ScriptedIdeaCollaborator>,
        stub: Arc<StubStageCollaborator>,
    }

    fn write_channel_config(config_root: &Path) {
        let body = json!({
            "name": CHANNEL,
            "prompt_constraints": ["first person"],
            "allowed_themes": ["history", "science"],
            "disallowed_themes": ["graphic_violence"],
            "visual_style": "muted realism",
            "narration_tone": "calm",
            "safety_rules": { "banned_terms": [] },
            "pacing": {
                "min_narration_secs": 2.0,
                "max_narration_secs": 30.0,
                "words_per_second": 2.5
            },
            "idea_candidates": 3,
            "upload_schedule": ["06:00"]
        });
        std::fs::create_dir_all(config_root).unwrap();
        std::fs::write(
            config_root.join(format!("{CHANNEL}.json")),
            serde_json::to_vec_pretty(&body).unwrap(),
        )
        .unwrap();
    }

    fn registry_with(
        idea: &Arc<ScriptedIdeaCollaborator>,
        stub: &Arc<StubStageCollaborator>,
        overrides: &[(&str, Arc<dyn Collaborator>)],
    ) -> CollaboratorRegistry {
        let mut registry = CollaboratorRegistry::new()
            .register("idea_generator", Arc::clone(idea) as Arc<dyn Collaborator>);
        for stage in PIPELINE {
            if stage.role == StageRole::Collaborate {
                if let Some(key) = stage.collaborator {
                    registry =
                        registry.register(key, Arc::clone(stub) as Arc<dyn Collaborator>);
                }
            }
        }
        for (key, collaborator) in overrides {
            registry = registry.register(*key, Arc::clone(collaborator));
        }
        registry
    }

    fn harness(candidates: Vec<&str>, overrides: &[(&str, Arc<dyn Collaborator>)]) -> Harness {
        let root = TempDir::new().unwrap();
        let config_root = root.path().join("channels");
        write_channel_config(&config_root);

        let idea = Arc::new(ScriptedIdeaCollaborator::new(
            candidates.into_iter().map(String::from).collect(),
        ));
        let stub = Arc::new(StubStageCollaborator::new());
        let registry = registry_with(&idea, &stub, overrides);

        let manager = RunManager::new(
            ConfigResolver::new(&config_root),
            root.path().join("runs"),
            Arc::new(registry),
        );
        Harness {
            _root: root,
            manager,
            idea,
            stub,
        }
    }

    fn benign_candidates() -> Vec<&'static str> {
        vec![
            "a quiet story about map making and nothing else",
            "a history of science told through one experiment",
            "a plain anecdote about commuting to work",
        ]
    }

    #[tokio::test]
    async fn test_full_pipeline_succeeds_and_persists_every_stage() {
        let h = harness(benign_candidates(), &[]);

        let run = h.manager.create_run(CHANNEL, Some(42)).unwrap();
        let result = h.manager.execute_run(&run.run_id).await.unwrap();
        assert_eq!(result.status, RunStatus::Succeeded);

        let dir = run_dir(h.manager.runs_root(), &run.run_id);
        let store = crate::artifact::ArtifactStore::open(&dir, run.run_id.as_str()).unwrap();
        for stage in PIPELINE {
            for name in stage.outputs {
                assert_eq!(
                    store.latest_version(stage.name, name).unwrap(),
                    Some(1),
                    "missing {}:{}",
                    stage.name,
                    name
                );
            }
        }

        // 3 candidate calls + one call per collaborator stage.
        assert_eq!(h.idea.call_count(), 3);
        let collaborate_stages = PIPELINE
            .iter()
            .filter(|s| s.role == StageRole::Collaborate)
            .count();
        assert_eq!(h.stub.call_count(), collaborate_stages);
    }

    #[tokio::test]
    async fn test_denylist_candidate_never_selected() {
        // Candidate #2 mentions the denied theme and would otherwise win
        // on theme mentions; #1 and #3 differ in score so the winner is
        // order-independent.
        let h = harness(
            vec![
                "a short history of canal locks",
                "the graphic_violence of a history of science battle",
                "a story about sorting mail",
            ],
            &[],
        );

        let run = h.manager.create_run(CHANNEL, Some(7)).unwrap();
        let result = h.manager.execute_run(&run.run_id).await.unwrap();
        assert_eq!(result.status, RunStatus::Succeeded);

        let dir = run_dir(h.manager.runs_root(), &run.run_id);
        let store = crate::artifact::ArtifactStore::open(&dir, run.run_id.as_str()).unwrap();

        let selection_artifacts = store.list(Some("selection")).unwrap();
        assert_eq!(selection_artifacts.len(), 1);
        assert_eq!(selection_artifacts[0].name, "selected_idea");
        assert_eq!(selection_artifacts[0].version, 1);

        let envelope = store.read_json("selection", "selected_idea").unwrap();
        // #1 mentions "history" (one allowed theme); it beats #3's zero.
        assert_eq!(envelope["data"]["generation_index"], json!(0));
    }

    #[tokio::test]
    async fn test_all_candidates_denied_fails_with_zero_artifacts() {
        let h = harness(
            vec![
                "graphic_violence story one",
                "another tale of graphic violence",
                "yet more graphic_violence",
            ],
            &[],
        );

        let run = h.manager.create_run(CHANNEL, Some(7)).unwrap();
        let result = h.manager.execute_run(&run.run_id).await.unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        let failure = result.failure.unwrap();
        assert_eq!(failure.stage, "selection");
        assert_eq!(failure.kind, "no_eligible_idea");

        let dir = run_dir(h.manager.runs_root(), &run.run_id);
        let store = crate::artifact::ArtifactStore::open(&dir, run.run_id.as_str()).unwrap();
        assert!(store.list(None).unwrap().is_empty());
        // Downstream stages never ran.
        assert_eq!(h.stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_halts_sequence_and_keeps_prior_artifacts() {
        let failing: Arc<dyn Collaborator> = Arc::new(FailingCollaborator::new("backend down"));
        let h = harness(benign_candidates(), &[("beat_planner", failing)]);

        let run = h.manager.create_run(CHANNEL, Some(9)).unwrap();
        let result = h.manager.execute_run(&run.run_id).await.unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        let failure = result.failure.unwrap();
        assert_eq!(failure.stage, "beats");
        assert_eq!(failure.kind, "collaborator_failure");

        let dir = run_dir(h.manager.runs_root(), &run.run_id);
        let store = crate::artifact::ArtifactStore::open(&dir, run.run_id.as_str()).unwrap();
        // Everything up to the failing stage is intact and inspectable.
        assert!(store.exists("selection", "selected_idea").unwrap());
        assert!(store.exists("script", "script").unwrap());
        // Nothing downstream executed.
        assert!(!store.exists("beats", "beats").unwrap());
        assert!(!store.exists("image_prompts", "image_prompts").unwrap());
    }

    #[tokio::test]
    async fn test_resume_reuses_seeds_and_artifacts() {
        let root = TempDir::new().unwrap();
        let config_root = root.path().join("channels");
        write_channel_config(&config_root);
        let runs_root = root.path().join("runs");

        let idea = Arc::new(ScriptedIdeaCollaborator::new(
            benign_candidates().into_iter().map(String::from).collect(),
        ));
        let stub = Arc::new(StubStageCollaborator::new());

        // First execution fails at voiceover.
        let failing: Arc<dyn Collaborator> = Arc::new(FailingCollaborator::new("tts offline"));
        let broken = RunManager::new(
            ConfigResolver::new(&config_root),
            &runs_root,
            Arc::new(registry_with(&idea, &stub, &[("voice_generator", failing)])),
        );

        let run = broken.create_run(CHANNEL, Some(1234)).unwrap();
        let result = broken.execute_run(&run.run_id).await.unwrap();
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.failure.unwrap().stage, "voiceover");

        let dir = run_dir(&runs_root, &run.run_id);
        let seeds_before = std::fs::read_to_string(dir.join("seeds.json")).unwrap();
        let selected_before = std::fs::read(dir.join("selection").join("selected_idea.v1")).unwrap();
        let idea_calls_before = idea.call_count();

        // Fix the collaborator and resume the same run id.
        let fixed = RunManager::new(
            ConfigResolver::new(&config_root),
            &runs_root,
            Arc::new(registry_with(&idea, &stub, &[])),
        );
        let result = fixed.execute_run(&run.run_id).await.unwrap();
        assert_eq!(result.status, RunStatus::Succeeded);

        // Completed stages were skipped: no candidate regeneration, no new
        // artifact version, and the recorded seeds are bit-identical.
        assert_eq!(idea.call_count(), idea_calls_before);
        assert_eq!(
            std::fs::read(dir.join("selection").join("selected_idea.v1")).unwrap(),
            selected_before
        );
        let seeds_after = std::fs::read_to_string(dir.join("seeds.json")).unwrap();
        for (key, value) in
            serde_json::from_str::<BTreeMap<String, u64>>(&seeds_before).unwrap()
        {
            let after: BTreeMap<String, u64> = serde_json::from_str(&seeds_after).unwrap();
            assert_eq!(after.get(&key), Some(&value), "seed for {key} changed");
        }

        let store = crate::artifact::ArtifactStore::open(&dir, run.run_id.as_str()).unwrap();
        assert_eq!(store.latest_version("render", "render").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_rerun_of_succeeded_run_is_noop() {
        let h = harness(benign_candidates(), &[]);

        let run = h.manager.create_run(CHANNEL, Some(5)).unwrap();
        let first = h.manager.execute_run(&run.run_id).await.unwrap();
        assert_eq!(first.status, RunStatus::Succeeded);

        let idea_calls = h.idea.call_count();
        let stub_calls = h.stub.call_count();

        let second = h.manager.execute_run(&run.run_id).await.unwrap();
        assert_eq!(second.status, RunStatus::Succeeded);
        assert_eq!(h.idea.call_count(), idea_calls);
        assert_eq!(h.stub.call_count(), stub_calls);

        let dir = run_dir(h.manager.runs_root(), &run.run_id);
        let store = crate::artifact::ArtifactStore::open(&dir, run.run_id.as_str()).unwrap();
        for stage in PIPELINE {
            for name in stage.outputs {
                assert_eq!(store.latest_version(stage.name, name).unwrap(), Some(1));
            }
        }
    }

    /// Requests cancellation of its own run while its stage executes,
    /// then completes the stage normally.
    #[derive(Default)]
    struct MidRunCanceller {
        manager: OnceLock<RunManager>,
        inner: StubStageCollaborator,
    }

    #[async_trait]
    impl Collaborator for MidRunCanceller {
        async fn invoke(
            &self,
            request: CollaboratorRequest,
        ) -> Result<CollaboratorResponse, CollaboratorError> {
            if let Some(manager) = self.manager.get() {
                let run_id = RunId::from(request.run_id.as_str());
                manager
                    .cancel_run(&run_id, "operator abort")
                    .map_err(|e| CollaboratorError::new(e.to_string()))?;
            }
            self.inner.invoke(request).await
        }
    }

    #[tokio::test]
    async fn test_cancel_running_run_stops_at_next_stage_boundary() {
        let canceller = Arc::new(MidRunCanceller::default());
        let h = harness(
            benign_candidates(),
            &[("scriptwriter", Arc::clone(&canceller) as Arc<dyn Collaborator>)],
        );
        canceller.manager.set(h.manager.clone()).unwrap();

        let run = h.manager.create_run(CHANNEL, Some(11)).unwrap();
        let result = h.manager.execute_run(&run.run_id).await.unwrap();

        // The script stage finishes its write; the run stops at the next
        // stage boundary with a cancelled failure.
        assert_eq!(result.status, RunStatus::Failed);
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, "cancelled");
        assert_eq!(failure.stage, "beats");

        let dir = run_dir(h.manager.runs_root(), &run.run_id);
        let store = crate::artifact::ArtifactStore::open(&dir, run.run_id.as_str()).unwrap();
        assert!(store.exists("script", "script").unwrap());
        assert!(!store.exists("beats", "beats").unwrap());
        // No later collaborator was invoked.
        assert_eq!(h.stub.call_count(), 0);

        let audit = AuditLog::open(&dir, run.run_id.as_str()).unwrap();
        let events: Vec<String> = audit
            .read_all()
            .unwrap()
            .into_iter()
            .map(|r| r.event)
            .collect();
        assert!(events.iter().any(|e| e == "run.cancel_requested"));
        assert!(events.iter().any(|e| e == "run.finalized"));
    }

    #[tokio::test]
    async fn test_cancel_pending_run() {
        let h = harness(benign_candidates(), &[]);

        let run = h.manager.create_run(CHANNEL, None).unwrap();
        assert!(h.manager.cancel_run(&run.run_id, "operator abort").unwrap());

        let record = load_record(h.manager.runs_root(), &run.run_id).unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.failure.unwrap().kind, "cancelled");

        // Cancelling a terminal run is a no-op.
        assert!(!h.manager.cancel_run(&run.run_id, "again").unwrap());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_any_stage() {
        let root = TempDir::new().unwrap();
        let config_root = root.path().join("channels");
        std::fs::create_dir_all(&config_root).unwrap();
        // Theme in both lists: self-contradictory.
        let body = json!({
            "name": CHANNEL,
            "prompt_constraints": [],
            "allowed_themes": ["history"],
            "disallowed_themes": ["history"],
            "visual_style": "muted",
            "narration_tone": "calm",
            "safety_rules": { "banned_terms": [] },
            "pacing": {
                "min_narration_secs": 2.0,
                "max_narration_secs": 30.0,
                "words_per_second": 2.5
            }
        });
        std::fs::write(
            config_root.join(format!("{CHANNEL}.json")),
            serde_json::to_vec(&body).unwrap(),
        )
        .unwrap();

        let manager = RunManager::new(
            ConfigResolver::new(&config_root),
            root.path().join("runs"),
            Arc::new(CollaboratorRegistry::new()),
        );

        let err = manager.create_run(CHANNEL, None).unwrap_err();
        assert!(matches!(err, ReelflowError::ConfigInvalid { .. }));
        assert!(manager.list_runs().unwrap().is_empty());
    }
}
