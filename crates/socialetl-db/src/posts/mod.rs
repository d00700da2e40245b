//! Database operations for the `posts` fact table.

mod export;
mod read;
mod stats;
mod types;
mod write;

use socialetl_core::EnrichedPost;
use sqlx::SqlitePool;

pub use types::{
    AggregateRow, ExportFormat, GroupBy, Metric, PostFilter, PostOrder, PostStats,
    SentimentShare,
};

pub(crate) use export::export;
pub(crate) use read::{count, get, search};
pub(crate) use stats::{aggregate, sentiment_distribution, stats, top_hashtags};

use crate::query::QueryFacade;
use crate::DbError;

/// Write side of the analytical store.
///
/// Cheap to clone; clones share the pool. Concurrent loads are serialized by
/// SQLite's writer lock and the unique `(platform, post_id)` index, so the
/// same key is never inserted twice.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read side over the same database.
    #[must_use]
    pub fn query(&self) -> QueryFacade {
        QueryFacade::new(self.pool.clone())
    }

    /// Insert a batch, skipping duplicates. Returns the number inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] on storage failure; nothing from the batch is
    /// kept in that case.
    pub async fn load(&self, posts: &[EnrichedPost]) -> Result<u64, DbError> {
        write::load(&self.pool, posts).await
    }
}
