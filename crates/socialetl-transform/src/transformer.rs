use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use socialetl_core::{
    EngagementLevel, EngagementThresholds, EnrichedPost, RawPost, ScoringConfig, SentimentLabel,
};

use crate::clean::{clean_text, count_mentions, count_words, extract_hashtags};
use crate::engagement::engagement_level;
use crate::sentiment::Lexicon;
use crate::validate::{validate, Rejection};

/// Counters for one run of the transform stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub accepted: u64,
    pub rejected: BTreeMap<Rejection, u64>,
    pub sentiment: BTreeMap<SentimentLabel, u64>,
    pub engagement: BTreeMap<EngagementLevel, u64>,
}

impl TransformStats {
    #[must_use]
    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }

    fn record(&mut self, post: &EnrichedPost) {
        self.accepted += 1;
        *self.sentiment.entry(post.sentiment).or_default() += 1;
        *self.engagement.entry(post.engagement).or_default() += 1;
    }

    fn reject(&mut self, reason: Rejection) {
        *self.rejected.entry(reason).or_default() += 1;
    }
}

/// Raw post to enriched post. Holds only the compiled scoring config, so one
/// instance can be shared by concurrent runs.
#[derive(Debug, Clone)]
pub struct Transformer {
    lexicon: Lexicon,
    thresholds: EngagementThresholds,
}

impl Transformer {
    #[must_use]
    pub fn new(scoring: &ScoringConfig) -> Self {
        Self {
            lexicon: Lexicon::new(&scoring.lexicon),
            thresholds: scoring.engagement,
        }
    }

    /// Enrich `raw`, stamping it with the current time.
    #[must_use]
    pub fn transform(&self, raw: RawPost) -> EnrichedPost {
        self.transform_at(raw, Utc::now())
    }

    /// Enrich `raw` with a fixed `processed_at`. Deterministic.
    #[must_use]
    pub fn transform_at(&self, raw: RawPost, processed_at: DateTime<Utc>) -> EnrichedPost {
        let text = clean_text(&raw.text);
        let hashtags = extract_hashtags(&text);
        let sentiment = self.lexicon.classify(&text);
        let engagement = engagement_level(raw.likes, raw.comments, &self.thresholds);
        let word_count = count_words(&text);
        let mention_count = count_mentions(&text);

        EnrichedPost {
            post_id: raw.post_id.trim().to_string(),
            platform: raw.platform,
            text,
            author: raw.author.trim().to_string(),
            timestamp: raw.timestamp,
            likes: raw.likes,
            comments: raw.comments,
            media_url: raw.media_url,
            url: raw.url,
            extra: raw.extra,
            hashtags,
            sentiment,
            engagement,
            word_count,
            mention_count,
            processed_at,
        }
    }

    /// Validate then enrich, counting the outcome in `stats`.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] when the post fails validation.
    pub fn accept(
        &self,
        raw: RawPost,
        stats: &mut TransformStats,
    ) -> Result<EnrichedPost, Rejection> {
        if let Err(reason) = validate(&raw) {
            tracing::debug!(
                platform = %raw.platform,
                post_id = %raw.post_id,
                reason = reason.as_str(),
                "rejected post"
            );
            stats.reject(reason);
            return Err(reason);
        }
        let post = self.transform(raw);
        stats.record(&post);
        Ok(post)
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

#[cfg(test)]
#[path = "transformer_test.rs"]
mod tests;
