//! Error types for the reelflow orchestration engine.
//!
//! Every failure surfaces to the stage executor, which halts the run and
//! records the failed stage and reason. No stage swallows an error and
//! silently continues.

use thiserror::Error;

/// The main error type for reelflow operations.
#[derive(Debug, Error)]
pub enum ReelflowError {
    /// No configuration exists for the requested channel.
    #[error("no configuration found for channel '{channel}'")]
    ConfigNotFound {
        /// The channel name.
        channel: String,
    },

    /// The channel configuration is missing required fields or is
    /// self-contradictory.
    #[error("invalid configuration for channel '{channel}': {}", problems.join("; "))]
    ConfigInvalid {
        /// The channel name.
        channel: String,
        /// Every validation problem found. Validation is exhaustive, so
        /// this lists all problems rather than the first one hit.
        problems: Vec<String>,
    },

    /// A stage read an artifact that does not exist. Indicates a skipped
    /// dependency or a corrupted store.
    #[error("artifact not found: run {run}, stage '{stage}', name '{name}'")]
    ArtifactNotFound {
        /// The run id.
        run: String,
        /// The stage that produced the artifact.
        stage: String,
        /// The logical artifact name.
        name: String,
    },

    /// Every idea candidate violated a hard safety or theme constraint.
    /// Fatal for the run; not retried automatically.
    #[error("no eligible idea: all {considered} candidates violate hard constraints")]
    NoEligibleIdea {
        /// How many candidates were considered before all were discarded.
        considered: usize,
    },

    /// The external capability a stage calls returned an error or timed out.
    #[error("collaborator failure in stage '{stage}': {reason}")]
    Collaborator {
        /// The stage whose collaborator failed.
        stage: String,
        /// The failure reason reported by the collaborator.
        reason: String,
    },

    /// The run was aborted between stages.
    #[error("run cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// No run record exists for the given run id.
    #[error("run not found: {run}")]
    RunNotFound {
        /// The run id.
        run: String,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReelflowError {
    /// Creates a collaborator failure for the given stage.
    #[must_use]
    pub fn collaborator(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Creates an artifact-not-found error.
    #[must_use]
    pub fn artifact_not_found(
        run: impl Into<String>,
        stage: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::ArtifactNotFound {
            run: run.into(),
            stage: stage.into(),
            name: name.into(),
        }
    }

    /// A short machine-readable kind for audit payloads and CLI messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigNotFound { .. } => "config_not_found",
            Self::ConfigInvalid { .. } => "config_invalid",
            Self::ArtifactNotFound { .. } => "artifact_not_found",
            Self::NoEligibleIdea { .. } => "no_eligible_idea",
            Self::Collaborator { .. } => "collaborator_failure",
            Self::Cancelled { .. } => "cancelled",
            Self::RunNotFound { .. } => "run_not_found",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReelflowError>;
