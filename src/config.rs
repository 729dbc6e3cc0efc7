//! Study configuration
//!
//! All tunables of the extraction pipeline live in one struct that is passed
//! explicitly into each component. Defaults match the deployment this engine
//! was built for: two repetitions per stimulus, `video_`/`image_` prefixes,
//! the standard browser meta keys.

use crate::metadata::StimulusKind;
use serde::{Deserialize, Serialize};

/// Mapping from a stimulus-name prefix to its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusPrefix {
    pub prefix: String,
    pub kind: StimulusKind,
}

/// Configuration for one extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Keys copied verbatim into the participant record (never
    /// repetition-indexed, overwritten by the latest occurrence)
    pub meta_keys: Vec<String>,
    /// Stimulus-name prefixes and the kind they map to
    pub stimulus_prefixes: Vec<StimulusPrefix>,
    /// Stimulus names containing any of these substrings are instruction
    /// screens: ignored, no state change
    pub instruction_patterns: Vec<String>,
    /// Maximum number of repeated presentations per stimulus; bounds the
    /// repetition-slot probing
    pub num_repeat: usize,
    /// Question short name injected as an attention check; excluded from
    /// per-question columns
    pub injection_question: String,
    /// Treat a single-valued `stimulus` cell carrying an immediate
    /// `response` as an inline post-trial answer
    pub inline_responses: bool,
    /// Allowed share of stimuli with implausible duration before a
    /// participant is flagged
    pub allowed_wrong_duration: usize,
    /// Allowed number of mistakes on verification questions before a
    /// participant is flagged
    pub allowed_mistakes_signs: usize,
}

impl Default for StudyConfig {
    fn default() -> Self {
        StudyConfig {
            meta_keys: [
                "worker_code",
                "browser_user_agent",
                "browser_app_name",
                "browser_major_version",
                "browser_full_version",
                "browser_name",
                "window_height",
                "window_width",
                "video_ids",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            stimulus_prefixes: vec![
                StimulusPrefix {
                    prefix: "video_".to_string(),
                    kind: StimulusKind::Video,
                },
                StimulusPrefix {
                    prefix: "image_".to_string(),
                    kind: StimulusKind::Image,
                },
            ],
            instruction_patterns: vec!["instruction".to_string()],
            num_repeat: 2,
            injection_question: "injection".to_string(),
            inline_responses: false,
            allowed_wrong_duration: 5,
            allowed_mistakes_signs: 2,
        }
    }
}

impl StudyConfig {
    pub fn is_meta_key(&self, key: &str) -> bool {
        self.meta_keys.iter().any(|k| k == key)
    }

    /// Classify a bare stimulus name. Instruction screens return `None`
    /// before prefixes are consulted.
    pub fn classify_stimulus(&self, name: &str) -> Option<StimulusKind> {
        if self
            .instruction_patterns
            .iter()
            .any(|p| name.contains(p.as_str()))
        {
            return None;
        }
        self.stimulus_prefixes
            .iter()
            .find(|p| name.starts_with(p.prefix.as_str()))
            .map(|p| p.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stimulus() {
        let config = StudyConfig::default();
        assert_eq!(config.classify_stimulus("video_0"), Some(StimulusKind::Video));
        assert_eq!(config.classify_stimulus("image_4"), Some(StimulusKind::Image));
        assert_eq!(config.classify_stimulus("instructions_1"), None);
        assert_eq!(config.classify_stimulus("consent"), None);
    }

    #[test]
    fn test_instruction_wins_over_prefix() {
        let mut config = StudyConfig::default();
        config.instruction_patterns.push("video_intro".to_string());
        assert_eq!(config.classify_stimulus("video_intro"), None);
    }

    #[test]
    fn test_default_meta_keys() {
        let config = StudyConfig::default();
        assert!(config.is_meta_key("worker_code"));
        assert!(config.is_meta_key("window_width"));
        assert!(!config.is_meta_key("video_0-dur"));
    }
}
