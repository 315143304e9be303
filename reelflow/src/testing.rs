//! Mock and stub collaborators for exercising the engine without real
//! model backends.
//!
//! These live in the library proper (not behind `cfg(test)`) so downstream
//! users and the CLI's dry wiring can reuse them.

use crate::stage::{
    Collaborator, CollaboratorError, CollaboratorRegistry, CollaboratorRequest,
    CollaboratorResponse, StageRole, PIPELINE,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Returns scripted idea candidates by generation index.
#[derive(Debug)]
pub struct ScriptedIdeaCollaborator {
    candidates: Vec<String>,
    call_count: AtomicUsize,
}

impl ScriptedIdeaCollaborator {
    /// Creates a collaborator that answers call *i* with `candidates[i]`
    /// (wrapping around).
    #[must_use]
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Returns how many times the collaborator was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collaborator for ScriptedIdeaCollaborator {
    async fn invoke(
        &self,
        request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let index = request
            .generation_index
            .ok_or_else(|| CollaboratorError::new("missing generation index"))? as usize;
        let text = if self.candidates.is_empty() {
            let themes = &request.config.allowed_themes;
            let theme = themes
                .get(index % themes.len().max(1))
                .map_or("everyday life", String::as_str);
            format!(
                "a {} short about {theme}, candidate {index}",
                request.config.narration_tone
            )
        } else {
            self.candidates[index % self.candidates.len()].clone()
        };

        Ok(CollaboratorResponse::single("candidate", json!(text)))
    }
}

/// Produces a deterministic placeholder payload for every declared output
/// of whatever stage invokes it.
#[derive(Debug, Default)]
pub struct StubStageCollaborator {
    call_count: AtomicUsize,
}

impl StubStageCollaborator {
    /// Creates a stub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times the collaborator was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collaborator for StubStageCollaborator {
    async fn invoke(
        &self,
        request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let stage = PIPELINE
            .iter()
            .find(|s| s.name == request.stage)
            .ok_or_else(|| CollaboratorError::new(format!("unknown stage '{}'", request.stage)))?;

        let mut outputs = BTreeMap::new();
        for name in stage.outputs {
            outputs.insert(
                (*name).to_string(),
                json!({
                    "stub": name,
                    "stage": stage.name,
                    "seed": request.seed,
                    "inputs": request.inputs.keys().collect::<Vec<_>>(),
                }),
            );
        }
        Ok(CollaboratorResponse { outputs })
    }
}

/// Always fails with a fixed reason. Useful for interrupting a run at a
/// chosen stage.
#[derive(Debug)]
pub struct FailingCollaborator {
    reason: String,
}

impl FailingCollaborator {
    /// Creates a collaborator that fails every call.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Collaborator for FailingCollaborator {
    async fn invoke(
        &self,
        _request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError> {
        Err(CollaboratorError::new(self.reason.clone()))
    }
}

/// Builds a registry that satisfies every pipeline stage with stubs,
/// generating idea candidates from the given texts (or from the channel
/// config when empty).
#[must_use]
pub fn stub_registry(candidates: Vec<String>) -> CollaboratorRegistry {
    let mut registry =
        CollaboratorRegistry::new().register("idea_generator", Arc::new(ScriptedIdeaCollaborator::new(candidates)));

    let stub = Arc::new(StubStageCollaborator::new());
    for stage in PIPELINE {
        if stage.role == StageRole::Collaborate {
            if let Some(key) = stage.collaborator {
                registry = registry.register(key, Arc::clone(&stub) as Arc<dyn Collaborator>);
            }
        }
    }
    registry
}
