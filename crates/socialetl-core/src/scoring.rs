//! Sentiment lexicon and engagement thresholds.
//!
//! Both are plain configuration data. The built-in defaults can be replaced
//! by a YAML file:
//!
//! ```yaml
//! lexicon:
//!   positive: [love, great, "🎉"]
//!   negative: [hate, awful]
//! engagement:
//!   medium: 10
//!   high: 100
//!   viral: 1000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const DEFAULT_POSITIVE: &[&str] = &[
    "love", "loved", "loving", "great", "amazing", "awesome", "excellent", "good", "best",
    "happy", "wonderful", "fantastic", "brilliant", "perfect", "beautiful", "incredible",
    "outstanding", "superb", "magnificent", "thank", "thanks", "grateful", "appreciate",
    "excited", "joy", "blessed", "recommend", "recommended", "favorite", "favourite",
    "impressive", "😊", "😍", "❤️", "👍", "🎉", "💯", "🙏", "😁", "🔥", "💪",
];

const DEFAULT_NEGATIVE: &[&str] = &[
    "hate", "hated", "hating", "bad", "terrible", "awful", "worst", "horrible", "angry", "sad",
    "disappointed", "disappointing", "frustrating", "frustrated", "annoying", "annoyed",
    "useless", "waste", "poor", "pathetic", "disgusting", "ugly", "stupid", "boring", "fail",
    "failed", "failing", "sucks", "broken", "scam", "fake", "trash", "garbage", "nightmare",
    "disappoints", "😢", "😡", "👎", "💔", "😤", "🤮", "😭", "😠", "🙄",
];

/// Word and emoji polarity lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconConfig {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            positive: DEFAULT_POSITIVE.iter().map(|s| (*s).to_string()).collect(),
            negative: DEFAULT_NEGATIVE.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Lower bounds (inclusive) of the medium, high and viral buckets.
/// Anything below `medium` is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementThresholds {
    pub medium: u64,
    pub high: u64,
    pub viral: u64,
}

impl Default for EngagementThresholds {
    fn default() -> Self {
        Self {
            medium: 10,
            high: 100,
            viral: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub lexicon: LexiconConfig,
    #[serde(default)]
    pub engagement: EngagementThresholds,
}

impl ScoringConfig {
    /// Parse and validate a scoring document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ScoringFileParse` for malformed YAML and
    /// `ConfigError::Validation` when the thresholds are not strictly ascending
    /// or a word appears in both polarity lists.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScoringConfig =
            serde_yaml::from_str(content).map_err(ConfigError::ScoringFileParse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the scoring document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ScoringFileIo {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.engagement;
        if !(t.medium < t.high && t.high < t.viral) {
            return Err(ConfigError::Validation(format!(
                "engagement thresholds must be strictly ascending, got medium={} high={} viral={}",
                t.medium, t.high, t.viral
            )));
        }

        if let Some(word) = self
            .lexicon
            .positive
            .iter()
            .find(|w| self.lexicon.negative.iter().any(|n| n.eq_ignore_ascii_case(w)))
        {
            return Err(ConfigError::Validation(format!(
                "'{word}' is listed as both positive and negative"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        ScoringConfig::default().validate().unwrap();
    }

    #[test]
    fn default_lexicon_contains_words_and_emoji() {
        let lexicon = LexiconConfig::default();
        assert!(lexicon.positive.iter().any(|w| w == "love"));
        assert!(lexicon.positive.iter().any(|w| w == "🎉"));
        assert!(lexicon.negative.iter().any(|w| w == "terrible"));
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_sections() {
        let config = ScoringConfig::from_yaml_str("engagement:\n  medium: 5\n  high: 50\n  viral: 500\n")
            .unwrap();
        assert_eq!(config.engagement.medium, 5);
        assert_eq!(config.lexicon, LexiconConfig::default());
    }

    #[test]
    fn rejects_non_ascending_thresholds() {
        let err = ScoringConfig::from_yaml_str("engagement:\n  medium: 100\n  high: 10\n  viral: 1000\n")
            .unwrap_err();
        assert!(err.to_string().contains("strictly ascending"));
    }

    #[test]
    fn rejects_word_in_both_lists() {
        let err = ScoringConfig::from_yaml_str("lexicon:\n  positive: [sick]\n  negative: [Sick]\n")
            .unwrap_err();
        assert!(err.to_string().contains("'sick'"));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = ScoringConfig::from_yaml_str("engagement: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::ScoringFileParse(_)));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lexicon:\n  positive: [stellar]\n  negative: [dire]").unwrap();
        let config = ScoringConfig::load(file.path()).unwrap();
        assert_eq!(config.lexicon.positive, vec!["stellar".to_string()]);
        assert_eq!(config.engagement, EngagementThresholds::default());
    }

    #[test]
    fn load_reports_missing_file_path() {
        let err = ScoringConfig::load(Path::new("/nonexistent/scoring.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ScoringFileIo { ref path, .. } if path.contains("scoring.yaml")));
    }
}
