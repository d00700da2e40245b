//! Query parameters and result shapes for the `posts` table.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use socialetl_core::{
    EngagementLevel, EnrichedPost, ExtraFields, ParseEnumError, Platform, SentimentLabel,
    StoredPost,
};
use sqlx::types::Json;

use crate::DbError;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Listing order. Every order breaks ties by `id` descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostOrder {
    #[default]
    ScrapedAt,
    Timestamp,
    Likes,
}

impl PostOrder {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            PostOrder::ScrapedAt => " ORDER BY scraped_at DESC, id DESC",
            PostOrder::Timestamp => " ORDER BY timestamp IS NULL, timestamp DESC, id DESC",
            PostOrder::Likes => " ORDER BY COALESCE(likes, -1) DESC, id DESC",
        }
    }
}

impl FromStr for PostOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scraped_at" | "scraped" => Ok(PostOrder::ScrapedAt),
            "timestamp" | "posted" => Ok(PostOrder::Timestamp),
            "likes" => Ok(PostOrder::Likes),
            _ => Err(parse_error("order", s)),
        }
    }
}

/// Row selection shared by listing and export. `limit: None` means no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub platform: Option<Platform>,
    pub author: Option<String>,
    pub sentiment: Option<SentimentLabel>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub order: PostOrder,
}

impl PostFilter {
    #[must_use]
    pub fn platform(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Platform,
    Sentiment,
    Engagement,
    Author,
    /// Calendar day (UTC) of the source timestamp.
    Day,
}

impl GroupBy {
    pub(crate) fn key_expr(self) -> &'static str {
        match self {
            GroupBy::Platform => "platform",
            GroupBy::Sentiment => "sentiment_label",
            GroupBy::Engagement => "engagement_level",
            GroupBy::Author => "author",
            GroupBy::Day => "substr(timestamp, 1, 10)",
        }
    }

    /// Rows excluded before grouping.
    pub(crate) fn where_clause(self) -> &'static str {
        match self {
            GroupBy::Day => " WHERE timestamp IS NOT NULL",
            GroupBy::Author => " WHERE author NOT IN ('', '[deleted]')",
            _ => "",
        }
    }
}

impl FromStr for GroupBy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "platform" => Ok(GroupBy::Platform),
            "sentiment" => Ok(GroupBy::Sentiment),
            "engagement" => Ok(GroupBy::Engagement),
            "author" => Ok(GroupBy::Author),
            "day" => Ok(GroupBy::Day),
            _ => Err(parse_error("group", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Count,
    TotalLikes,
    AvgLikes,
    TotalComments,
}

impl Metric {
    /// Always a REAL so every metric decodes the same way.
    pub(crate) fn value_expr(self) -> &'static str {
        match self {
            Metric::Count => "CAST(COUNT(*) AS REAL)",
            Metric::TotalLikes => "CAST(COALESCE(SUM(likes), 0) AS REAL)",
            Metric::AvgLikes => "COALESCE(AVG(likes), 0.0)",
            Metric::TotalComments => "CAST(COALESCE(SUM(comments), 0) AS REAL)",
        }
    }
}

impl FromStr for Metric {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "count" => Ok(Metric::Count),
            "total_likes" | "likes" => Ok(Metric::TotalLikes),
            "avg_likes" | "average_likes" => Ok(Metric::AvgLikes),
            "total_comments" | "comments" => Ok(Metric::TotalComments),
            _ => Err(parse_error("metric", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    /// One JSON array per column.
    Columnar,
}

impl FromStr for ExportFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "columnar" | "json" => Ok(ExportFormat::Columnar),
            _ => Err(parse_error("export format", s)),
        }
    }
}

fn parse_error(kind: &'static str, value: &str) -> ParseEnumError {
    ParseEnumError {
        kind,
        value: value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentShare {
    pub label: SentimentLabel,
    pub count: i64,
    /// Share of the filtered total, 0-100, two decimals.
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostStats {
    pub total: i64,
    pub by_platform: Vec<(String, i64)>,
    pub by_sentiment: Vec<(String, i64)>,
    pub by_engagement: Vec<(String, i64)>,
    pub top_authors: Vec<(String, i64)>,
    pub top_hashtags: Vec<(String, i64)>,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

pub(crate) const POST_COLUMNS: &str = "id, post_id, platform, post_text, author, timestamp, \
     likes, comments, media_url, url, extra, hashtags, sentiment_label, engagement_level, \
     word_count, mention_count, processed_at, scraped_at";

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: i64,
    pub post_id: String,
    pub platform: String,
    pub post_text: String,
    pub author: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub media_url: Option<String>,
    pub url: String,
    pub extra: Json<ExtraFields>,
    pub hashtags: Json<Vec<String>>,
    pub sentiment_label: String,
    pub engagement_level: String,
    pub word_count: i64,
    pub mention_count: i64,
    pub processed_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for StoredPost {
    type Error = DbError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let bad = |reason: String| DbError::Decode { id, reason };

        let platform: Platform = row.platform.parse().map_err(|e: ParseEnumError| bad(e.to_string()))?;
        let sentiment: SentimentLabel = row
            .sentiment_label
            .parse()
            .map_err(|e: ParseEnumError| bad(e.to_string()))?;
        let engagement: EngagementLevel = row
            .engagement_level
            .parse()
            .map_err(|e: ParseEnumError| bad(e.to_string()))?;

        Ok(StoredPost {
            id,
            scraped_at: row.scraped_at,
            post: EnrichedPost {
                post_id: row.post_id,
                platform,
                text: row.post_text,
                author: row.author,
                timestamp: row.timestamp,
                likes: row.likes.and_then(|v| u64::try_from(v).ok()),
                comments: row.comments.and_then(|v| u64::try_from(v).ok()),
                media_url: row.media_url,
                url: row.url,
                extra: row.extra.0,
                hashtags: row.hashtags.0,
                sentiment,
                engagement,
                word_count: u32::try_from(row.word_count).unwrap_or(0),
                mention_count: u32::try_from(row.mention_count).unwrap_or(0),
                processed_at: row.processed_at,
            },
        })
    }
}

pub(crate) fn into_stored(rows: Vec<PostRow>) -> Result<Vec<StoredPost>, DbError> {
    rows.into_iter().map(StoredPost::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_parse_from_cli_words() {
        assert_eq!("likes".parse::<PostOrder>().unwrap(), PostOrder::Likes);
        assert_eq!("Day".parse::<GroupBy>().unwrap(), GroupBy::Day);
        assert_eq!("avg-likes".parse::<Metric>().unwrap(), Metric::AvgLikes);
        assert_eq!("columnar".parse::<ExportFormat>().unwrap(), ExportFormat::Columnar);
    }

    #[test]
    fn unknown_parameter_names_the_kind() {
        let err = "parquet".parse::<ExportFormat>().unwrap_err();
        assert_eq!(err.to_string(), "unknown export format 'parquet'");
    }

    #[test]
    fn default_filter_lists_newest_scraped_first() {
        let filter = PostFilter::default();
        assert_eq!(filter.order, PostOrder::ScrapedAt);
        assert!(filter.limit.is_none());
        assert!(PostOrder::ScrapedAt.order_by().contains("scraped_at DESC, id DESC"));
    }
}
