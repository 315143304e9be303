//! # Reelflow
//!
//! A run-based orchestration engine for short-form vertical video
//! pipelines. Reelflow sequences a fixed set of content stages
//! (idea → script → visuals → audio → captions → assembly → render),
//! keeps every creative decision reproducible, persists all intermediate
//! state as inspectable artifacts, and resolves channel-specific behavior
//! through configuration rather than branching code.
//!
//! The generative work itself (text, images, speech, caption alignment)
//! is delegated to external [`stage::Collaborator`]s: opaque capabilities
//! with a fixed input/output contract.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reelflow::prelude::*;
//!
//! let manager = RunManager::new(
//!     ConfigResolver::new("channels"),
//!     "runs",
//!     Arc::new(registry),
//! );
//!
//! let run = manager.create_run("facts_channel", Some(42))?;
//! let result = manager.execute_run(&run.run_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifact;
pub mod audit;
pub mod config;
pub mod errors;
pub mod idea;
pub mod run;
pub mod schedule;
pub mod seed;
pub mod stage;
pub mod testing;
pub mod util;

/// Schema version stamped into every persisted artifact envelope.
pub const SCHEMA_VERSION: &str = "1.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifact::{ArtifactDescriptor, ArtifactStore};
    pub use crate::audit::{AuditLog, AuditRecord};
    pub use crate::config::{ChannelConfig, ConfigResolver, PacingTargets, ScheduleTime};
    pub use crate::errors::{ReelflowError, Result};
    pub use crate::idea::IdeaCandidate;
    pub use crate::run::{RunId, RunManager, RunRecord, RunResult, RunStatus};
    pub use crate::seed::SeedManager;
    pub use crate::stage::{
        Collaborator, CollaboratorRegistry, CollaboratorRequest, CollaboratorResponse,
        StageDescriptor, StageExecutor, PIPELINE,
    };
}
