//! The external collaborator contract.
//!
//! Each stage invokes exactly one external capability with a fixed input
//! shape and gets back either a payload matching the stage's declared
//! outputs or a typed failure. Collaborators are black boxes and
//! synchronous from the stage's perspective; any internal polling or
//! retrying is their own business.

use crate::config::ChannelConfig;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// A typed failure from a collaborator call. The orchestration core treats
/// a call as binary success/failure with no partial credit.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct CollaboratorError {
    /// What went wrong, as reported by the collaborator.
    pub reason: String,
}

impl CollaboratorError {
    /// Creates a collaborator error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The fixed input shape for a collaborator call.
#[derive(Debug, Clone)]
pub struct CollaboratorRequest {
    /// The run id, for logging and idempotency on the collaborator side.
    pub run_id: String,
    /// The invoking stage name.
    pub stage: String,
    /// The resolved channel configuration, shared read-only.
    pub config: Arc<ChannelConfig>,
    /// The seed fixed for this call's stochastic decisions.
    pub seed: u64,
    /// Prior artifacts, keyed by declared input artifact name.
    pub inputs: BTreeMap<String, serde_json::Value>,
    /// For idea generation: which parallel candidate call this is.
    pub generation_index: Option<u32>,
}

/// A successful collaborator payload: one JSON value per declared output
/// artifact name. The executor verifies every declared output is present.
#[derive(Debug, Clone, Default)]
pub struct CollaboratorResponse {
    /// Outputs keyed by artifact name.
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl CollaboratorResponse {
    /// Creates a response with a single output.
    #[must_use]
    pub fn single(name: impl Into<String>, value: serde_json::Value) -> Self {
        let mut outputs = BTreeMap::new();
        outputs.insert(name.into(), value);
        Self { outputs }
    }
}

/// An external capability a stage calls.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Invokes the capability.
    async fn invoke(
        &self,
        request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError>;
}

/// Maps collaborator keys from stage descriptors to implementations.
#[derive(Default, Clone)]
pub struct CollaboratorRegistry {
    entries: HashMap<String, Arc<dyn Collaborator>>,
}

impl CollaboratorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collaborator under a key, replacing any previous entry.
    #[must_use]
    pub fn register(mut self, key: impl Into<String>, collaborator: Arc<dyn Collaborator>) -> Self {
        self.entries.insert(key.into(), collaborator);
        self
    }

    /// Looks up a collaborator by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn Collaborator>> {
        self.entries.get(key).cloned()
    }

    /// Returns the registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for CollaboratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
