//! Snapshot export to CSV or a column-oriented JSON document.
//!
//! Output is written to a temporary file next to the destination and renamed
//! into place, so readers never see a half-written export.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use socialetl_core::StoredPost;
use sqlx::SqlitePool;
use tempfile::NamedTempFile;

use super::read;
use super::types::{ExportFormat, PostFilter};
use crate::DbError;

const COLUMNS: [&str; 18] = [
    "id",
    "post_id",
    "platform",
    "post_text",
    "author",
    "timestamp",
    "likes",
    "comments",
    "media_url",
    "url",
    "hashtags",
    "sentiment_label",
    "engagement_level",
    "word_count",
    "mention_count",
    "processed_at",
    "scraped_at",
    "extra",
];

/// Export every row matching `filter` to `path`. Returns the row count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the read fails and [`DbError::Export`] if the
/// file cannot be written or renamed into place.
pub async fn export(
    pool: &SqlitePool,
    format: ExportFormat,
    filter: &PostFilter,
    path: &Path,
) -> Result<usize, DbError> {
    let mut conn = pool.acquire().await?;
    let posts = read::get(&mut conn, filter).await?;
    drop(conn);

    let rows = posts.len();
    let destination = path.to_path_buf();
    let export_error = |path: &Path, source: io::Error| DbError::Export {
        path: path.display().to_string(),
        source,
    };

    tokio::task::spawn_blocking(move || write_atomically(format, &posts, &destination))
        .await
        .map_err(|e| export_error(path, io::Error::other(e)))?
        .map_err(|e| export_error(path, e))?;

    tracing::info!(rows, path = %path.display(), ?format, "exported posts");
    Ok(rows)
}

fn write_atomically(format: ExportFormat, posts: &[StoredPost], path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        match format {
            ExportFormat::Csv => write_csv(&mut out, posts)?,
            ExportFormat::Columnar => {
                serde_json::to_writer(&mut out, &columnar(posts)).map_err(io::Error::other)?;
            }
        }
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn cells(post: &StoredPost) -> [Value; 18] {
    let p = &post.post;
    [
        json!(post.id),
        json!(p.post_id),
        json!(p.platform.as_str()),
        json!(p.text),
        json!(p.author),
        json!(p.timestamp.map(|t| t.to_rfc3339())),
        json!(p.likes),
        json!(p.comments),
        json!(p.media_url),
        json!(p.url),
        json!(p.hashtags),
        json!(p.sentiment.as_str()),
        json!(p.engagement.as_str()),
        json!(p.word_count),
        json!(p.mention_count),
        json!(p.processed_at.to_rfc3339()),
        json!(post.scraped_at.to_rfc3339()),
        json!(p.extra),
    ]
}

fn columnar(posts: &[StoredPost]) -> Value {
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(posts.len()); COLUMNS.len()];
    for post in posts {
        for (column, cell) in columns.iter_mut().zip(cells(post)) {
            column.push(cell);
        }
    }
    json!({
        "format": "columnar",
        "row_count": posts.len(),
        "columns": COLUMNS
            .iter()
            .zip(columns)
            .map(|(name, values)| json!({"name": name, "values": values}))
            .collect::<Vec<_>>(),
    })
}

fn write_csv<W: Write>(out: &mut W, posts: &[StoredPost]) -> io::Result<()> {
    writeln!(out, "{}", COLUMNS.join(","))?;
    for post in posts {
        let line = cells(post)
            .iter()
            .enumerate()
            .map(|(i, cell)| csv_field(&csv_text(COLUMNS[i], cell)))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Flat text for one CSV cell. Hashtags are comma-joined; other arrays and
/// objects stay JSON.
fn csv_text(column: &str, cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) if column == "hashtags" => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
