//! Small shared utilities: timestamps and atomic file writes.

use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::Path;

/// Returns the current UTC time as an RFC3339 string with a `Z` suffix.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Writes `bytes` to `path` atomically.
///
/// Writes to a uniquely-named sibling temp file and renames it into
/// place, so a reader never observes a half-written file. The unique temp
/// name also keeps concurrent writers to the same path (the run manager
/// and a cancelling process both rewriting `run.json`) from truncating
/// each other's in-flight bytes: each rename publishes one complete
/// payload.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
