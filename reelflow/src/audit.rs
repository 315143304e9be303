//! Append-only audit log, one JSONL file per run.
//!
//! Every decision (selected idea, seed used, stage timing and outcome,
//! terminal transition) is recorded keyed by run. Records are write-once
//! and never deleted within a run's lifetime. Concurrent runs never share
//! a file because the path is run-scoped.

use crate::errors::Result;
use crate::util::iso_timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const AUDIT_FILE: &str = "audit.jsonl";

/// One append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The run the entry belongs to.
    pub run_id: String,
    /// The stage involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// The event name, e.g. `stage.completed`.
    pub event: String,
    /// Event details.
    pub payload: serde_json::Value,
    /// RFC3339 timestamp.
    pub timestamp: String,
}

/// Appends audit records for one run.
#[derive(Debug)]
pub struct AuditLog {
    run_id: String,
    path: PathBuf,
    // Serializes appends so interleaved writers never split a line.
    lock: Mutex<()>,
}

impl AuditLog {
    /// Opens the audit log for a run directory.
    pub fn open(run_dir: &Path, run_id: &str) -> Result<Self> {
        std::fs::create_dir_all(run_dir)?;
        Ok(Self {
            run_id: run_id.to_string(),
            path: run_dir.join(AUDIT_FILE),
            lock: Mutex::new(()),
        })
    }

    /// Appends an event for the run as a whole.
    pub fn record(&self, event: &str, payload: serde_json::Value) -> Result<()> {
        self.append(None, event, payload)
    }

    /// Appends an event attributed to a stage.
    pub fn record_stage(&self, stage: &str, event: &str, payload: serde_json::Value) -> Result<()> {
        self.append(Some(stage.to_string()), event, payload)
    }

    fn append(&self, stage: Option<String>, event: &str, payload: serde_json::Value) -> Result<()> {
        let record = AuditRecord {
            run_id: self.run_id.clone(),
            stage,
            event: event.to_string(),
            payload,
            timestamp: iso_timestamp(),
        };

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;

        info!(
            run_id = %record.run_id,
            stage = record.stage.as_deref().unwrap_or(""),
            event = %record.event,
            "audit"
        );
        Ok(())
    }

    /// Reads every record appended so far, in order.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_records_append_in_order() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::open(dir.path(), "run-1").unwrap();

        log.record("run.created", serde_json::json!({ "channel": "facts" }))
            .unwrap();
        log.record_stage("idea", "stage.started", serde_json::json!({}))
            .unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, "run.created");
        assert_eq!(records[1].stage.as_deref(), Some("idea"));
    }

    #[test]
    fn test_reopen_appends_rather_than_truncates() {
        let dir = TempDir::new().unwrap();
        {
            let log = AuditLog::open(dir.path(), "run-1").unwrap();
            log.record("run.created", serde_json::json!({})).unwrap();
        }
        let log = AuditLog::open(dir.path(), "run-1").unwrap();
        log.record("run.finalized", serde_json::json!({})).unwrap();

        assert_eq!(log.read_all().unwrap().len(), 2);
    }
}
