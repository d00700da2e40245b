use std::path::Path;

use socialetl_core::{Platform, StoredPost};
use sqlx::SqlitePool;

use crate::posts::{
    self, AggregateRow, ExportFormat, GroupBy, Metric, PostFilter, PostStats, SentimentShare,
};
use crate::DbError;

/// Read side of the store: listing, search, aggregates and export.
///
/// Every method takes its own pooled connection, so a facade can be shared
/// freely while loads are running.
#[derive(Debug, Clone)]
pub struct QueryFacade {
    pool: SqlitePool,
}

impl QueryFacade {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a row cannot be decoded.
    pub async fn get(&self, filter: &PostFilter) -> Result<Vec<StoredPost>, DbError> {
        let mut conn = self.pool.acquire().await?;
        posts::get(&mut conn, filter).await
    }

    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn count(&self, filter: &PostFilter) -> Result<i64, DbError> {
        let mut conn = self.pool.acquire().await?;
        posts::count(&mut conn, filter).await
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a row cannot be decoded.
    pub async fn search(&self, text: &str, limit: u32) -> Result<Vec<StoredPost>, DbError> {
        let mut conn = self.pool.acquire().await?;
        posts::search(&mut conn, text, limit).await
    }

    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn aggregate(
        &self,
        group_by: GroupBy,
        metric: Metric,
    ) -> Result<Vec<AggregateRow>, DbError> {
        let mut conn = self.pool.acquire().await?;
        posts::aggregate(&mut conn, group_by, metric).await
    }

    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if any query fails.
    pub async fn stats(&self) -> Result<PostStats, DbError> {
        let mut conn = self.pool.acquire().await?;
        posts::stats(&mut conn).await
    }

    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn sentiment_distribution(
        &self,
        platform: Option<Platform>,
    ) -> Result<Vec<SentimentShare>, DbError> {
        let mut conn = self.pool.acquire().await?;
        posts::sentiment_distribution(&mut conn, platform).await
    }

    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn top_hashtags(&self, limit: u32) -> Result<Vec<(String, i64)>, DbError> {
        let mut conn = self.pool.acquire().await?;
        posts::top_hashtags(&mut conn, limit).await
    }

    /// Write the rows matching `filter` to `path`. Returns the row count.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read or the file write fails.
    pub async fn export(
        &self,
        format: ExportFormat,
        filter: &PostFilter,
        path: &Path,
    ) -> Result<usize, DbError> {
        posts::export(&self.pool, format, filter, path).await
    }
}
