//! Post records as they move through extract, transform and load.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform-specific fields that do not have a column of their own
/// (`subreddit`, `upvote_ratio`, `view_count`, `channel_id`, ...).
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// A source of posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Twitter,
    Youtube,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Reddit,
        Platform::Twitter,
        Platform::Youtube,
        Platform::Instagram,
    ];
}

string_enum!(Platform, "platform", {
    Reddit => "reddit",
    Twitter => "twitter",
    Youtube => "youtube",
    Instagram => "instagram",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

string_enum!(SentimentLabel, "sentiment label", {
    Positive => "positive",
    Negative => "negative",
    Neutral => "neutral",
});

/// Coarse bucket of combined likes and comments.
///
/// Variants are declared in ascending order so `Ord` follows engagement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
    Viral,
}

string_enum!(EngagementLevel, "engagement level", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Viral => "viral",
});

/// Listing order for sources that support one. Only changes retrieval order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Hot,
    New,
    Top,
    Rising,
}

string_enum!(SortOrder, "sort order", {
    Hot => "hot",
    New => "new",
    Top => "top",
    Rising => "rising",
});

/// One post exactly as an extractor produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    /// Unique within `platform`.
    pub post_id: String,
    pub platform: Platform,
    pub text: String,
    pub author: String,
    /// Source-reported publication time. `None` when the source did not expose one.
    pub timestamp: Option<DateTime<Utc>>,
    /// `None` means unknown, which is different from zero.
    pub likes: Option<u64>,
    /// `None` means unknown, which is different from zero.
    pub comments: Option<u64>,
    pub media_url: Option<String>,
    pub url: String,
    #[serde(default)]
    pub extra: ExtraFields,
}

impl RawPost {
    /// Minimal post with every optional field empty.
    #[must_use]
    pub fn new(platform: Platform, post_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            platform,
            text: text.into(),
            author: String::new(),
            timestamp: None,
            likes: None,
            comments: None,
            media_url: None,
            url: String::new(),
            extra: ExtraFields::new(),
        }
    }
}

/// A cleaned, labelled post ready to be loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPost {
    pub post_id: String,
    pub platform: Platform,
    /// Cleaned text.
    pub text: String,
    pub author: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    pub media_url: Option<String>,
    pub url: String,
    #[serde(default)]
    pub extra: ExtraFields,
    /// Hashtags without the leading `#`, first-seen order, no duplicates.
    pub hashtags: Vec<String>,
    pub sentiment: SentimentLabel,
    pub engagement: EngagementLevel,
    pub word_count: u32,
    pub mention_count: u32,
    pub processed_at: DateTime<Utc>,
}

impl EnrichedPost {
    /// The natural key used for deduplication at load time.
    #[must_use]
    pub fn dedup_key(&self) -> (Platform, &str) {
        (self.platform, self.post_id.as_str())
    }
}

/// A post as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPost {
    /// Store-assigned, monotonically increasing.
    pub id: i64,
    pub scraped_at: DateTime<Utc>,
    #[serde(flatten)]
    pub post: EnrichedPost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn platform_parse_is_case_insensitive() {
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::Youtube);
    }

    #[test]
    fn unknown_platform_reports_kind_and_value() {
        let err = "myspace".parse::<Platform>().unwrap_err();
        assert_eq!(err.kind, "platform");
        assert_eq!(err.to_string(), "unknown platform 'myspace'");
    }

    #[test]
    fn engagement_levels_are_ordered() {
        assert!(EngagementLevel::Low < EngagementLevel::Medium);
        assert!(EngagementLevel::High < EngagementLevel::Viral);
    }

    #[test]
    fn stored_post_serializes_flat() {
        let stored = StoredPost {
            id: 7,
            scraped_at: Utc::now(),
            post: EnrichedPost {
                post_id: "abc".to_string(),
                platform: Platform::Reddit,
                text: "hello".to_string(),
                author: "someone".to_string(),
                timestamp: None,
                likes: Some(1),
                comments: None,
                media_url: None,
                url: String::new(),
                extra: ExtraFields::new(),
                hashtags: vec![],
                sentiment: SentimentLabel::Neutral,
                engagement: EngagementLevel::Low,
                word_count: 1,
                mention_count: 0,
                processed_at: Utc::now(),
            },
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["post_id"], "abc");
        assert_eq!(value["platform"], "reddit");
        assert_eq!(value["id"], 7);
        assert!(value["comments"].is_null());
    }
}
