//! Declarative upload schedule export.
//!
//! The engine exposes, per channel, a set of times-of-day that an external
//! scheduler (cron or equivalent) reads to invoke the run CLI. The engine
//! itself never reads or writes OS scheduler state.

use crate::config::{ConfigResolver, ScheduleTime};
use crate::errors::Result;
use std::collections::BTreeMap;

/// Builds the channel -> times-of-day mapping for the given channels.
///
/// Each channel's config is resolved (and therefore fully validated); the
/// returned times are sorted and deduplicated.
pub fn export(
    resolver: &ConfigResolver,
    channels: &[String],
) -> Result<BTreeMap<String, Vec<ScheduleTime>>> {
    let mut mapping = BTreeMap::new();
    for channel in channels {
        let config = resolver.resolve(channel)?;
        let mut times = config.upload_schedule.clone();
        times.sort();
        times.dedup();
        mapping.insert(channel.clone(), times);
    }
    Ok(mapping)
}

/// Like [`export`], but over every channel with a config file.
pub fn export_all(resolver: &ConfigResolver) -> Result<BTreeMap<String, Vec<ScheduleTime>>> {
    let channels = resolver.channels()?;
    export(resolver, &channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReelflowError;
    use tempfile::TempDir;

    fn write_config(dir: &std::path::Path, name: &str, schedule: &[&str]) {
        let body = serde_json::json!({
            "name": name,
            "prompt_constraints": [],
            "allowed_themes": ["history"],
            "disallowed_themes": [],
            "visual_style": "muted",
            "narration_tone": "calm",
            "safety_rules": { "banned_terms": [] },
            "pacing": {
                "min_narration_secs": 45.0,
                "max_narration_secs": 55.0,
                "words_per_second": 2.5
            },
            "upload_schedule": schedule
        });
        std::fs::write(
            dir.join(format!("{name}.json")),
            serde_json::to_vec(&body).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_export_sorts_and_dedups() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "facts_channel", &["18:00", "06:00", "18:00"]);

        let resolver = ConfigResolver::new(dir.path());
        let mapping = export_all(&resolver).unwrap();

        let times: Vec<String> = mapping["facts_channel"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(times, vec!["06:00", "18:00"]);
    }

    #[test]
    fn test_export_validates_configs() {
        let dir = TempDir::new().unwrap();
        let resolver = ConfigResolver::new(dir.path());

        let err = export(&resolver, &["missing".to_string()]).unwrap_err();
        assert!(matches!(err, ReelflowError::ConfigNotFound { .. }));
    }
}
