use socialetl_core::StoredPost;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::types::{into_stored, PostFilter, PostRow, POST_COLUMNS};
use crate::DbError;

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(platform) = filter.platform {
        builder.push(" AND platform = ").push_bind(platform.as_str());
    }
    if let Some(author) = &filter.author {
        builder.push(" AND author = ").push_bind(author.clone());
    }
    if let Some(sentiment) = filter.sentiment {
        builder
            .push(" AND sentiment_label = ")
            .push_bind(sentiment.as_str());
    }
}

/// Filtered listing, ordered by `filter.order`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Decode`] for a
/// malformed row.
pub async fn get(conn: &mut SqliteConnection, filter: &PostFilter) -> Result<Vec<StoredPost>, DbError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
    push_filter(&mut builder, filter);
    builder.push(filter.order.order_by());
    // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
    builder
        .push(" LIMIT ")
        .push_bind(filter.limit.map_or(-1, i64::from))
        .push(" OFFSET ")
        .push_bind(i64::from(filter.offset));

    let rows: Vec<PostRow> = builder.build_query_as().fetch_all(conn).await?;
    into_stored(rows)
}

/// Number of rows matching `filter`, ignoring its limit and offset.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count(conn: &mut SqliteConnection, filter: &PostFilter) -> Result<i64, DbError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
    push_filter(&mut builder, filter);
    let total: i64 = builder.build_query_scalar().fetch_one(conn).await?;
    Ok(total)
}

/// Substring search over cleaned text, ignoring case.
///
/// Ranked by number of occurrences, then likes, then newest. A blank needle
/// matches nothing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Decode`] for a
/// malformed row.
pub async fn search(
    conn: &mut SqliteConnection,
    text: &str,
    limit: u32,
) -> Result<Vec<StoredPost>, DbError> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts \
         WHERE instr(search_text, ?1) > 0 \
         ORDER BY (length(search_text) - length(replace(search_text, ?1, ''))) \
                  / length(?1) DESC, \
                  COALESCE(likes, -1) DESC, \
                  id DESC \
         LIMIT ?2"
    );
    let rows: Vec<PostRow> = sqlx::query_as(&sql)
        .bind(&needle)
        .bind(i64::from(limit))
        .fetch_all(conn)
        .await?;
    into_stored(rows)
}
