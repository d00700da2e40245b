//! Lexicon sentiment: +1 per positive token, -1 per negative token.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use socialetl_core::{LexiconConfig, SentimentLabel};

/// Word tokens and single pictographic emoji.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|\p{Extended_Pictographic}").expect("valid regex"));

const VARIATION_SELECTOR: char = '\u{FE0F}';

/// Polarity lookup compiled from a [`LexiconConfig`].
#[derive(Debug, Clone)]
pub struct Lexicon {
    polarity: HashMap<String, i32>,
}

impl Lexicon {
    /// Entries are lowercased and stripped of emoji variation selectors so
    /// `❤️` in the config matches a bare `❤` in text. Validation keeps the two
    /// lists disjoint; if they are not, the negative entry wins.
    #[must_use]
    pub fn new(config: &LexiconConfig) -> Self {
        let mut polarity = HashMap::new();
        for word in &config.positive {
            polarity.insert(normalize_entry(word), 1);
        }
        for word in &config.negative {
            polarity.insert(normalize_entry(word), -1);
        }
        polarity.remove("");
        Self { polarity }
    }

    /// Net polarity of `text`.
    #[must_use]
    pub fn score(&self, text: &str) -> i32 {
        TOKEN_RE
            .find_iter(text)
            .map(|m| {
                let token = m.as_str().to_lowercase();
                self.polarity.get(&token).copied().unwrap_or(0)
            })
            .sum()
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> SentimentLabel {
        match self.score(text) {
            s if s > 0 => SentimentLabel::Positive,
            s if s < 0 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(&LexiconConfig::default())
    }
}

fn normalize_entry(word: &str) -> String {
    word.trim()
        .chars()
        .filter(|c| *c != VARIATION_SELECTOR)
        .collect::<String>()
        .to_lowercase()
}
