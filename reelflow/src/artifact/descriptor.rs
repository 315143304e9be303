//! Artifact metadata.

use serde::{Deserialize, Serialize};

/// Metadata for one persisted artifact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// The run that owns the artifact.
    pub run_id: String,
    /// The stage that produced it.
    pub stage: String,
    /// The logical artifact name.
    pub name: String,
    /// The version, starting at 1. A rerun produces a new version, never
    /// an overwrite.
    pub version: u32,
    /// SHA-256 of the payload, hex encoded.
    pub content_hash: String,
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl ArtifactDescriptor {
    /// The file name this version is stored under within its stage
    /// directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.v{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let desc = ArtifactDescriptor {
            run_id: "run-1".to_string(),
            stage: "script".to_string(),
            name: "script".to_string(),
            version: 2,
            content_hash: "ab".to_string(),
            size_bytes: 2,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(desc.file_name(), "script.v2");
    }
}
