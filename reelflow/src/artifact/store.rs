//! Filesystem-backed artifact store scoped to one run.

use super::ArtifactDescriptor;
use crate::errors::{ReelflowError, Result};
use crate::util::{iso_timestamp, write_atomic};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const INDEX_FILE: &str = "artifacts.jsonl";

/// Persists stage outputs under a run-scoped directory.
///
/// Layout contract (read by external tooling: audits, manual review,
/// analytics): one directory per stage name, one file per
/// (artifact name, version) named `<name>.v<version>`. Writes are
/// append-only; an existing version is never mutated. Each write is
/// atomic, so a cancelled run never leaves a half-persisted output.
#[derive(Debug)]
pub struct ArtifactStore {
    run_id: String,
    run_dir: PathBuf,
    // Serializes version allocation and index appends within the owning
    // process. Cross-run concurrency needs no lock: each run has an
    // exclusive namespace.
    write_lock: Mutex<()>,
}

impl ArtifactStore {
    /// Opens the store for a run directory, creating it if needed.
    pub fn open(run_dir: impl AsRef<Path>, run_id: &str) -> Result<Self> {
        let run_dir = run_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&run_dir)?;
        Ok(Self {
            run_id: run_id.to_string(),
            run_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the run directory backing the store.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Writes a new artifact version and returns its descriptor.
    ///
    /// If the (stage, name) cell already has versions, the payload is
    /// written as the next version; prior versions stay untouched.
    pub fn write(&self, stage: &str, name: &str, payload: &[u8]) -> Result<ArtifactDescriptor> {
        validate_component(stage)?;
        validate_component(name)?;

        let _guard = self.write_lock.lock();

        let version = self.latest_version(stage, name)?.map_or(1, |v| v + 1);
        let descriptor = ArtifactDescriptor {
            run_id: self.run_id.clone(),
            stage: stage.to_string(),
            name: name.to_string(),
            version,
            content_hash: hex::encode(Sha256::digest(payload)),
            size_bytes: payload.len() as u64,
            created_at: iso_timestamp(),
        };

        let path = self.run_dir.join(stage).join(descriptor.file_name());
        write_atomic(&path, payload)?;
        // The payload write and the index append are separate steps. A
        // crash between them leaves the version readable but unlisted:
        // `read`, `exists`, and `latest_version` scan the stage directory
        // and stay authoritative, while `list` reads only the index.
        self.append_index(&descriptor)?;

        debug!(
            stage = %stage,
            name = %name,
            version,
            bytes = payload.len(),
            "wrote artifact"
        );
        Ok(descriptor)
    }

    /// Reads an artifact payload, defaulting to the latest version.
    ///
    /// # Errors
    ///
    /// `ArtifactNotFound` if the (stage, name) cell has no versions, or the
    /// requested version does not exist.
    pub fn read(&self, stage: &str, name: &str, version: Option<u32>) -> Result<Vec<u8>> {
        validate_component(stage)?;
        validate_component(name)?;

        let version = match version {
            Some(v) => v,
            None => self
                .latest_version(stage, name)?
                .ok_or_else(|| ReelflowError::artifact_not_found(&self.run_id, stage, name))?,
        };

        let path = self.run_dir.join(stage).join(format!("{name}.v{version}"));
        std::fs::read(&path)
            .map_err(|_| ReelflowError::artifact_not_found(&self.run_id, stage, name))
    }

    /// Reads the latest version of an artifact as a JSON value.
    pub fn read_json(&self, stage: &str, name: &str) -> Result<serde_json::Value> {
        let bytes = self.read(stage, name, None)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Returns true if at least one version of the artifact exists.
    pub fn exists(&self, stage: &str, name: &str) -> Result<bool> {
        Ok(self.latest_version(stage, name)?.is_some())
    }

    /// Returns the latest version number of an artifact, if any.
    pub fn latest_version(&self, stage: &str, name: &str) -> Result<Option<u32>> {
        let stage_dir = self.run_dir.join(stage);
        if !stage_dir.is_dir() {
            return Ok(None);
        }

        let prefix = format!("{name}.v");
        let mut latest = None;
        for entry in std::fs::read_dir(&stage_dir)? {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(rest) = file_name.strip_prefix(&prefix) {
                if let Ok(version) = rest.parse::<u32>() {
                    latest = Some(latest.map_or(version, |v: u32| v.max(version)));
                }
            }
        }
        Ok(latest)
    }

    /// Lists artifact descriptors, optionally filtered by stage, in write
    /// order.
    ///
    /// Backed by the append-only index, so a version whose index append
    /// was lost to a crash is invisible here even though `exists` and
    /// `read` still see it on disk.
    pub fn list(&self, stage: Option<&str>) -> Result<Vec<ArtifactDescriptor>> {
        let index_path = self.run_dir.join(INDEX_FILE);
        if !index_path.is_file() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&index_path)?;
        let mut descriptors = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let descriptor: ArtifactDescriptor = serde_json::from_str(line)?;
            if stage.map_or(true, |s| descriptor.stage == s) {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }

    fn append_index(&self, descriptor: &ArtifactDescriptor) -> Result<()> {
        let mut line = serde_json::to_vec(descriptor)?;
        line.push(b'\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir.join(INDEX_FILE))?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Stage names and artifact names form file paths, so they are restricted
/// to a flat lowercase alphabet.
fn validate_component(component: &str) -> Result<()> {
    let ok = !component.is_empty()
        && component
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ReelflowError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid artifact path component '{component}'"),
        )))
    }
}
