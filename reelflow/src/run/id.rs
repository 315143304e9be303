//! Time-sortable run identifiers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique run identifier: UTC timestamp plus a random suffix, e.g.
/// `20260829T143210Z-3f2a9c1d`. Lexicographic order matches creation
/// order, which keeps run directories sorted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Allocates a fresh run id.
    #[must_use]
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{stamp}-{}", &suffix[..8]))
    }

    /// Wraps an existing id string, e.g. for resume.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_shape() {
        let id = RunId::generate();
        let (stamp, suffix) = id.as_str().split_once('-').unwrap();
        assert_eq!(stamp.len(), 16);
        assert!(stamp.ends_with('Z'));
        assert_eq!(suffix.len(), 8);
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = RunId::from_string("20260101T000000Z-abcd1234");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"20260101T000000Z-abcd1234\"");
    }
}
