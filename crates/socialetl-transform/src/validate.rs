//! Record-level checks that exclude a post before it reaches the store.

use serde::Serialize;
use socialetl_core::RawPost;
use thiserror::Error;

/// Why a post was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("post id is empty")]
    EmptyPostId,
    #[error("post has no timestamp")]
    MissingTimestamp,
}

impl Rejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::EmptyPostId => "empty_post_id",
            Rejection::MissingTimestamp => "missing_timestamp",
        }
    }
}

/// # Errors
///
/// Returns the first [`Rejection`] that applies to `post`.
pub fn validate(post: &RawPost) -> Result<(), Rejection> {
    if post.post_id.trim().is_empty() {
        return Err(Rejection::EmptyPostId);
    }
    if post.timestamp.is_none() {
        return Err(Rejection::MissingTimestamp);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use socialetl_core::Platform;

    use super::*;

    fn dated(id: &str) -> RawPost {
        let mut post = RawPost::new(Platform::Reddit, id, "text");
        post.timestamp = Some(Utc::now());
        post
    }

    #[test]
    fn complete_post_passes() {
        assert_eq!(validate(&dated("abc")), Ok(()));
    }

    #[test]
    fn blank_id_is_rejected() {
        assert_eq!(validate(&dated("")), Err(Rejection::EmptyPostId));
        assert_eq!(validate(&dated("   ")), Err(Rejection::EmptyPostId));
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        let post = RawPost::new(Platform::Twitter, "1", "text");
        assert_eq!(validate(&post), Err(Rejection::MissingTimestamp));
    }

    #[test]
    fn empty_text_is_allowed() {
        let mut post = dated("abc");
        post.text.clear();
        assert!(validate(&post).is_ok());
    }
}
