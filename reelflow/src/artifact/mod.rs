//! The artifact store: addressable, versioned, immutable stage outputs.
//!
//! The store is the single source of truth for resuming or auditing a run.
//! Every stage output is retrievable independent of the process that
//! produced it.

mod descriptor;
mod store;

pub use descriptor::ArtifactDescriptor;
pub use store::ArtifactStore;
