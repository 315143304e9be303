//! Run identity, persisted run records, and the run manager.

mod id;
mod manager;
mod record;

pub use id::RunId;
pub use manager::RunManager;
pub use record::{load_record, run_dir, save_record, RunRecord, RunResult, RunStatus, StageFailure};
