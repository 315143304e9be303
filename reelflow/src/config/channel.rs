//! Typed channel configuration.

use serde::{Deserialize, Serialize};

/// A time of day in an upload schedule, serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleTime {
    /// Hour of day (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
}

impl ScheduleTime {
    /// Creates a schedule time, validating the range.
    pub fn new(hour: u8, minute: u8) -> Result<Self, String> {
        if hour > 23 || minute > 59 {
            return Err(format!("time of day out of range: {hour:02}:{minute:02}"));
        }
        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for ScheduleTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (h, m) = value
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got '{value}'"))?;
        let hour: u8 = h.parse().map_err(|_| format!("bad hour in '{value}'"))?;
        let minute: u8 = m.parse().map_err(|_| format!("bad minute in '{value}'"))?;
        Self::new(hour, minute)
    }
}

impl From<ScheduleTime> for String {
    fn from(t: ScheduleTime) -> Self {
        format!("{:02}:{:02}", t.hour, t.minute)
    }
}

impl std::fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Hard safety rules for a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyRules {
    /// Terms that disqualify a candidate outright when mentioned.
    #[serde(default)]
    pub banned_terms: Vec<String>,
}

/// Pacing targets for narration length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingTargets {
    /// Minimum narration length in seconds.
    pub min_narration_secs: f64,
    /// Maximum narration length in seconds.
    pub max_narration_secs: f64,
    /// Expected narration rate, used to estimate duration from word count.
    pub words_per_second: f64,
}

/// The full configuration for one distribution channel.
///
/// Immutable after load; shared read-only across all stages of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// The channel name. Must match the config file stem.
    pub name: String,

    /// Constraints injected into generation prompts.
    pub prompt_constraints: Vec<String>,

    /// Themes the channel favors. Mentions raise a candidate's score.
    pub allowed_themes: Vec<String>,

    /// Themes that hard-disqualify a candidate.
    pub disallowed_themes: Vec<String>,

    /// Visual style rules passed to image stages.
    pub visual_style: String,

    /// Narration tone passed to script and voiceover stages.
    pub narration_tone: String,

    /// Hard safety rules.
    pub safety_rules: SafetyRules,

    /// Pacing targets.
    pub pacing: PacingTargets,

    /// How many idea candidates to generate per run.
    #[serde(default = "default_idea_candidates")]
    pub idea_candidates: u32,

    /// Declarative upload schedule read by an external scheduler.
    #[serde(default)]
    pub upload_schedule: Vec<ScheduleTime>,
}

fn default_idea_candidates() -> u32 {
    3
}

impl ChannelConfig {
    /// Validates the loaded configuration exhaustively.
    ///
    /// Returns every problem found, not just the first. An empty vec means
    /// the configuration is valid.
    #[must_use]
    pub fn validation_problems(&self, expected_name: &str) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("channel name is empty".to_string());
        } else if self.name != expected_name {
            problems.push(format!(
                "channel name '{}' does not match config file '{}'",
                self.name, expected_name
            ));
        }

        if self.visual_style.trim().is_empty() {
            problems.push("visual_style is empty".to_string());
        }
        if self.narration_tone.trim().is_empty() {
            problems.push("narration_tone is empty".to_string());
        }

        for theme in &self.allowed_themes {
            if self.disallowed_themes.contains(theme) {
                problems.push(format!(
                    "theme '{theme}' is listed as both allowed and disallowed"
                ));
            }
        }

        if self.pacing.min_narration_secs <= 0.0 {
            problems.push("pacing.min_narration_secs must be positive".to_string());
        }
        if self.pacing.max_narration_secs < self.pacing.min_narration_secs {
            problems.push(format!(
                "pacing window is inverted: min {} > max {}",
                self.pacing.min_narration_secs, self.pacing.max_narration_secs
            ));
        }
        if self.pacing.words_per_second <= 0.0 {
            problems.push("pacing.words_per_second must be positive".to_string());
        }

        if self.idea_candidates == 0 {
            problems.push("idea_candidates must be at least 1".to_string());
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn valid_config(name: &str) -> ChannelConfig {
        ChannelConfig {
            name: name.to_string(),
            prompt_constraints: vec!["first person".to_string()],
            allowed_themes: vec!["history".to_string()],
            disallowed_themes: vec!["graphic_violence".to_string()],
            visual_style: "muted realism".to_string(),
            narration_tone: "calm".to_string(),
            safety_rules: SafetyRules::default(),
            pacing: PacingTargets {
                min_narration_secs: 45.0,
                max_narration_secs: 55.0,
                words_per_second: 2.5,
            },
            idea_candidates: 3,
            upload_schedule: vec![],
        }
    }

    #[test]
    fn test_valid_config_has_no_problems() {
        let config = valid_config("facts_channel");
        assert!(config.validation_problems("facts_channel").is_empty());
    }

    #[test]
    fn test_contradictory_themes_rejected() {
        let mut config = valid_config("facts_channel");
        config.allowed_themes.push("graphic_violence".to_string());

        let problems = config.validation_problems("facts_channel");
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("both allowed and disallowed"));
    }

    #[test]
    fn test_inverted_pacing_window_rejected() {
        let mut config = valid_config("facts_channel");
        config.pacing.min_narration_secs = 60.0;

        let problems = config.validation_problems("facts_channel");
        assert!(problems.iter().any(|p| p.contains("inverted")));
    }

    #[test]
    fn test_name_mismatch_rejected() {
        let config = valid_config("facts_channel");
        let problems = config.validation_problems("other_channel");
        assert!(problems.iter().any(|p| p.contains("does not match")));
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let mut config = valid_config("facts_channel");
        config.visual_style.clear();
        config.narration_tone.clear();
        config.idea_candidates = 0;

        let problems = config.validation_problems("facts_channel");
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn test_schedule_time_parsing() {
        let t = ScheduleTime::try_from("09:30".to_string()).unwrap();
        assert_eq!(t, ScheduleTime { hour: 9, minute: 30 });
        assert_eq!(t.to_string(), "09:30");

        assert!(ScheduleTime::try_from("24:00".to_string()).is_err());
        assert!(ScheduleTime::try_from("nine".to_string()).is_err());
    }

    #[test]
    fn test_schedule_time_roundtrip() {
        let json = serde_json::json!(["06:00", "18:15"]);
        let times: Vec<ScheduleTime> = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&times).unwrap(), json);
    }
}
