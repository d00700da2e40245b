use chrono::Utc;
use socialetl_core::EnrichedPost;
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::DbError;

fn to_i64(value: Option<u64>) -> Option<i64> {
    value.map(|v| i64::try_from(v).unwrap_or(i64::MAX))
}

/// Insert `posts` in one transaction, skipping keys that already exist.
///
/// Returns the number of rows inserted. All rows of one call share a
/// `scraped_at`. Any storage error rolls the whole call back, and so does
/// dropping the future before it completes.
///
/// Posts with a blank `post_id` are never stored; they are skipped with a
/// warning and not counted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the transaction cannot be started, an insert
/// fails, or the commit fails.
pub async fn load(pool: &SqlitePool, posts: &[EnrichedPost]) -> Result<u64, DbError> {
    if posts.is_empty() {
        return Ok(0);
    }

    let scraped_at = Utc::now();
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for post in posts {
        let (platform, post_id) = post.dedup_key();
        if post_id.trim().is_empty() {
            tracing::warn!(%platform, "skipping post with blank post_id");
            continue;
        }

        let result = sqlx::query(
            "INSERT INTO posts \
                 (post_id, platform, post_text, author, timestamp, likes, comments, \
                  media_url, url, extra, hashtags, sentiment_label, engagement_level, \
                  word_count, mention_count, processed_at, scraped_at, search_text) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (platform, post_id) DO NOTHING",
        )
        .bind(post_id)
        .bind(platform.as_str())
        .bind(&post.text)
        .bind(&post.author)
        .bind(post.timestamp)
        .bind(to_i64(post.likes))
        .bind(to_i64(post.comments))
        .bind(&post.media_url)
        .bind(&post.url)
        .bind(Json(&post.extra))
        .bind(Json(&post.hashtags))
        .bind(post.sentiment.as_str())
        .bind(post.engagement.as_str())
        .bind(i64::from(post.word_count))
        .bind(i64::from(post.mention_count))
        .bind(post.processed_at)
        .bind(scraped_at)
        .bind(post.text.to_lowercase())
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    tracing::debug!(batch = posts.len(), inserted, "loaded posts");
    Ok(inserted)
}
