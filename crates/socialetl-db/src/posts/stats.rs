//! Aggregates over the `posts` table. Each function is a single SQL pass.

use chrono::{DateTime, Utc};
use socialetl_core::{Platform, SentimentLabel};
use sqlx::SqliteConnection;

use super::types::{AggregateRow, GroupBy, Metric, PostStats, SentimentShare};
use crate::DbError;

const TOP_AUTHORS: i64 = 10;
const TOP_HASHTAGS: u32 = 10;

/// `metric` per distinct `group_by` key, largest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn aggregate(
    conn: &mut SqliteConnection,
    group_by: GroupBy,
    metric: Metric,
) -> Result<Vec<AggregateRow>, DbError> {
    // Both fragments come from fixed enum tables, never from input.
    let sql = format!(
        "SELECT {key} AS group_key, {value} AS metric_value FROM posts{filter} \
         GROUP BY group_key ORDER BY metric_value DESC, group_key ASC",
        key = group_by.key_expr(),
        value = metric.value_expr(),
        filter = group_by.where_clause(),
    );
    let rows: Vec<(String, f64)> = sqlx::query_as(&sql).fetch_all(conn).await?;
    Ok(rows
        .into_iter()
        .map(|(key, value)| AggregateRow { key, value })
        .collect())
}

async fn counts_by(conn: &mut SqliteConnection, column: &str) -> Result<Vec<(String, i64)>, DbError> {
    let sql = format!(
        "SELECT {column}, COUNT(*) AS n FROM posts GROUP BY {column} ORDER BY n DESC, {column}"
    );
    Ok(sqlx::query_as(&sql).fetch_all(conn).await?)
}

/// Hashtags by number of posts using them. Spellings that differ only in
/// ASCII case are counted together.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_hashtags(conn: &mut SqliteConnection, limit: u32) -> Result<Vec<(String, i64)>, DbError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT MAX(tag.value) AS hashtag, COUNT(*) AS n \
         FROM posts, json_each(posts.hashtags) AS tag \
         GROUP BY lower(tag.value) \
         ORDER BY n DESC, hashtag ASC \
         LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Sentiment counts with their share of the total, optionally for one platform.
///
/// Labels with no posts are reported with a zero count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sentiment_distribution(
    conn: &mut SqliteConnection,
    platform: Option<Platform>,
) -> Result<Vec<SentimentShare>, DbError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT sentiment_label, COUNT(*) FROM posts \
         WHERE ?1 IS NULL OR platform = ?1 \
         GROUP BY sentiment_label",
    )
    .bind(platform.map(Platform::as_str))
    .fetch_all(conn)
    .await?;

    let total: i64 = rows.iter().map(|(_, n)| n).sum();
    let count_of = |label: SentimentLabel| {
        rows.iter()
            .find(|(l, _)| l == label.as_str())
            .map_or(0, |(_, n)| *n)
    };

    Ok([
        SentimentLabel::Positive,
        SentimentLabel::Neutral,
        SentimentLabel::Negative,
    ]
    .into_iter()
    .map(|label| {
        let count = count_of(label);
        SentimentShare {
            label,
            count,
            percent: percent(count, total),
        }
    })
    .collect())
}

#[allow(clippy::cast_precision_loss)]
fn percent(count: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 10_000.0 / total as f64).round() / 100.0
}

/// Whole-table summary.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn stats(conn: &mut SqliteConnection) -> Result<PostStats, DbError> {
    let (total, earliest, latest): (i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
        sqlx::query_as("SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM posts")
            .fetch_one(&mut *conn)
            .await?;

    let by_platform = counts_by(&mut *conn, "platform").await?;
    let by_sentiment = counts_by(&mut *conn, "sentiment_label").await?;
    let by_engagement = counts_by(&mut *conn, "engagement_level").await?;

    let top_authors: Vec<(String, i64)> = sqlx::query_as(
        "SELECT author, COUNT(*) AS n FROM posts \
         WHERE author NOT IN ('', '[deleted]') \
         GROUP BY author ORDER BY n DESC, author LIMIT ?",
    )
    .bind(TOP_AUTHORS)
    .fetch_all(&mut *conn)
    .await?;

    let hashtags = top_hashtags(&mut *conn, TOP_HASHTAGS).await?;

    Ok(PostStats {
        total,
        by_platform,
        by_sentiment,
        by_engagement,
        top_authors,
        top_hashtags: hashtags,
        earliest,
        latest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_two_decimals() {
        assert!((percent(1, 3) - 33.33).abs() < f64::EPSILON);
        assert!((percent(2, 3) - 66.67).abs() < f64::EPSILON);
        assert!(percent(0, 0).abs() < f64::EPSILON);
    }
}
