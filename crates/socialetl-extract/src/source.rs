//! The extractor capability and the lazy paging driver behind it.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Fuse, Stream, StreamExt};
use socialetl_core::{Platform, RawPost, SortOrder};

use crate::error::ExtractError;

/// What to extract from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Free-text search (hashtag for Instagram).
    Query(String),
    /// A subreddit listing. Reddit only.
    Subreddit(String),
}

impl Target {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Target::Query(q) | Target::Subreddit(q) => q,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Query(q) => write!(f, "query '{q}'"),
            Target::Subreddit(s) => write!(f, "r/{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub target: Target,
    /// Upper bound on yielded posts.
    pub limit: usize,
    pub sort: Option<SortOrder>,
}

/// A lazy stream of extracted posts that can be closed early.
///
/// Dropping the stream abandons any session it holds. [`PostStream::close`]
/// asks the source to stop and waits until it has released its session.
pub struct PostStream<'a> {
    inner: Fuse<BoxStream<'a, Result<RawPost, ExtractError>>>,
    closing: Arc<AtomicBool>,
}

impl<'a> PostStream<'a> {
    /// Wrap `inner`, which must end itself once `closing` is set.
    pub fn new<S>(inner: S, closing: Arc<AtomicBool>) -> Self
    where
        S: Stream<Item = Result<RawPost, ExtractError>> + Send + 'a,
    {
        Self {
            inner: inner.boxed().fuse(),
            closing,
        }
    }

    /// Stop early. Items not yet pulled are discarded.
    pub async fn close(mut self) {
        self.closing.store(true, Ordering::Release);
        while self.inner.next().await.is_some() {}
    }
}

impl Stream for PostStream<'_> {
    type Item = Result<RawPost, ExtractError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for PostStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostStream")
            .field("closing", &self.closing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// A source of raw posts.
///
/// Every call to [`SourceExtractor::extract`] starts a fresh session and
/// returns a lazy stream: nothing touches the network until it is polled.
/// The stream yields at most `request.limit` posts and ends after the first
/// permanent error.
pub trait SourceExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    fn extract<'a>(&'a self, request: &ExtractRequest) -> PostStream<'a>;
}

/// One fetched page of items. Item errors are yielded in place.
pub(crate) type Page = Vec<Result<RawPost, ExtractError>>;

/// Page-at-a-time source state driven by [`into_stream`].
#[async_trait]
pub(crate) trait Cursor: Send {
    /// Fetch the next page, asking for at most `remaining` posts.
    ///
    /// `Ok(None)` means the source is exhausted. An `Err` is yielded and
    /// then ends the stream, since the cursor cannot advance past it.
    async fn next_page(&mut self, remaining: usize) -> Result<Option<Page>, ExtractError>;

    /// Release any session held by the cursor.
    async fn finish(&mut self) {}
}

struct DriverState<C> {
    cursor: C,
    buffer: VecDeque<Result<RawPost, ExtractError>>,
    yielded: usize,
    limit: usize,
    finished: bool,
    closing: Arc<AtomicBool>,
}

impl<C: Cursor> DriverState<C> {
    async fn end(mut self) -> Option<(Result<RawPost, ExtractError>, Self)> {
        if !self.finished {
            self.finished = true;
            self.cursor.finish().await;
        }
        None
    }
}

/// Turn a cursor into a bounded lazy stream.
pub(crate) fn into_stream<'a, C>(cursor: C, limit: usize) -> PostStream<'a>
where
    C: Cursor + 'a,
{
    let closing = Arc::new(AtomicBool::new(false));
    let state = DriverState {
        cursor,
        buffer: VecDeque::new(),
        yielded: 0,
        limit,
        finished: false,
        closing: Arc::clone(&closing),
    };

    let driver = stream::unfold(state, |mut st| async move {
        loop {
            if st.yielded >= st.limit || st.closing.load(Ordering::Acquire) {
                return st.end().await;
            }

            if let Some(item) = st.buffer.pop_front() {
                match &item {
                    Ok(_) => st.yielded += 1,
                    Err(e) if e.is_permanent() => {
                        st.buffer.clear();
                        st.cursor.finish().await;
                        st.finished = true;
                        st.limit = st.yielded;
                    }
                    Err(_) => {}
                }
                return Some((item, st));
            }

            if st.finished {
                return None;
            }

            match st.cursor.next_page(st.limit - st.yielded).await {
                Ok(Some(page)) => st.buffer.extend(page),
                Ok(None) => return st.end().await,
                Err(e) => {
                    tracing::warn!(error = %e, "extraction stopped");
                    st.cursor.finish().await;
                    st.finished = true;
                    st.limit = st.yielded;
                    return Some((Err(e), st));
                }
            }
        }
    });
    PostStream::new(driver, closing)
}
