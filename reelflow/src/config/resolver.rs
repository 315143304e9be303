//! Loads and validates channel configurations from a config root.

use super::ChannelConfig;
use crate::errors::{ReelflowError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Resolves channel names to validated configurations.
///
/// One config file per channel lives at `<config_root>/<channel>.json`.
/// Validation is exhaustive and happens once, before any stage executes:
/// a bad config fails the run loudly and early.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    config_root: PathBuf,
}

impl ConfigResolver {
    /// Creates a resolver rooted at the given directory.
    #[must_use]
    pub fn new(config_root: impl AsRef<Path>) -> Self {
        Self {
            config_root: config_root.as_ref().to_path_buf(),
        }
    }

    /// Returns the config root directory.
    #[must_use]
    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Loads and validates the configuration for a channel.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound` if no config file exists for the channel;
    /// `ConfigInvalid` listing every problem if required fields are missing
    /// or constraint rules are self-contradictory.
    pub fn resolve(&self, channel: &str) -> Result<Arc<ChannelConfig>> {
        let path = self.config_root.join(format!("{channel}.json"));
        if !path.is_file() {
            return Err(ReelflowError::ConfigNotFound {
                channel: channel.to_string(),
            });
        }

        let raw = std::fs::read_to_string(&path)?;
        let config: ChannelConfig =
            serde_json::from_str(&raw).map_err(|e| ReelflowError::ConfigInvalid {
                channel: channel.to_string(),
                problems: vec![format!("malformed config: {e}")],
            })?;

        let problems = config.validation_problems(channel);
        if !problems.is_empty() {
            return Err(ReelflowError::ConfigInvalid {
                channel: channel.to_string(),
                problems,
            });
        }

        debug!(channel = %channel, path = %path.display(), "resolved channel config");
        Ok(Arc::new(config))
    }

    /// Lists the channels that have a config file under the root.
    pub fn channels(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.config_root.is_dir() {
            return Ok(names);
        }
        for entry in std::fs::read_dir(&self.config_root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
