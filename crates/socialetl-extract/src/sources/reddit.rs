//! Reddit public JSON listings (`/r/{sub}/{sort}.json` and `/search.json`).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Url;
use serde::Deserialize;
use socialetl_core::{ExtraFields, Platform, RawPost, SortOrder};

use crate::error::ExtractError;
use crate::http::JsonFetcher;
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::source::{into_stream, Cursor, ExtractRequest, Page, PostStream, SourceExtractor, Target};

const DEFAULT_BASE_URL: &str = "https://old.reddit.com/";
const PERMALINK_BASE: &str = "https://reddit.com";
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    author: Option<String>,
    score: Option<i64>,
    num_comments: Option<u64>,
    created_utc: Option<f64>,
    upvote_ratio: Option<f64>,
    thumbnail: Option<String>,
    preview: Option<Preview>,
    link_flair_text: Option<String>,
    #[serde(default)]
    permalink: String,
    subreddit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Preview {
    #[serde(default)]
    images: Vec<PreviewImage>,
}

#[derive(Debug, Deserialize)]
struct PreviewImage {
    source: Option<ImageSource>,
}

#[derive(Debug, Deserialize)]
struct ImageSource {
    url: Option<String>,
}

/// Extracts posts from Reddit's unauthenticated JSON endpoints.
pub struct RedditExtractor {
    fetcher: Arc<dyn JsonFetcher>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    base_url: Url,
}

impl RedditExtractor {
    /// # Errors
    ///
    /// Never fails with the built-in base URL; see [`Self::with_base_url`].
    pub fn new(
        fetcher: Arc<dyn JsonFetcher>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Result<Self, ExtractError> {
        Self::with_base_url(fetcher, limiter, retry, DEFAULT_BASE_URL)
    }

    /// Point the extractor at another host (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidTarget`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        fetcher: Arc<dyn JsonFetcher>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        base_url: &str,
    ) -> Result<Self, ExtractError> {
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ExtractError::InvalidTarget {
            platform: Platform::Reddit,
            reason: format!("invalid base URL '{base_url}': {e}"),
        })?;
        Ok(Self {
            fetcher,
            limiter,
            retry,
            base_url,
        })
    }

    fn listing_url(
        &self,
        target: &Target,
        sort: Option<SortOrder>,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<Url, ExtractError> {
        let path = match target {
            Target::Subreddit(name) => {
                let sort = sort.unwrap_or(SortOrder::Hot);
                format!("r/{}/{}.json", normalize_subreddit(name)?, sort.as_str())
            }
            Target::Query(_) => "search.json".to_string(),
        };
        let mut url = self.base_url.join(&path).map_err(|e| ExtractError::InvalidTarget {
            platform: Platform::Reddit,
            reason: e.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            if let Target::Query(q) = target {
                let q = q.trim();
                if q.is_empty() {
                    return Err(ExtractError::InvalidTarget {
                        platform: Platform::Reddit,
                        reason: "search query is empty".to_string(),
                    });
                }
                query.append_pair("q", q);
                query.append_pair("sort", search_sort(sort));
                query.append_pair("type", "link");
            }
            query.append_pair("limit", &page_size.to_string());
            query.append_pair("raw_json", "1");
            if let Some(after) = after {
                query.append_pair("after", after);
            }
        }
        Ok(url)
    }

    async fn fetch_listing(&self, url: &Url) -> Result<Listing, ExtractError> {
        let context = format!("reddit listing {}", url.path());
        let body = retry_with_backoff(self.retry, &context, || async move {
            self.limiter.acquire(Platform::Reddit.as_str()).await;
            self.fetcher.get_json(url, &[]).await.map_err(classify)
        })
        .await?;

        serde_json::from_value(body).map_err(|e| ExtractError::Deserialize {
            context,
            source: e,
        })
    }
}

impl SourceExtractor for RedditExtractor {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    fn extract<'a>(&'a self, request: &ExtractRequest) -> PostStream<'a> {
        tracing::info!(target_name = %request.target, limit = request.limit, "extracting from reddit");
        let cursor = RedditCursor {
            extractor: self,
            target: request.target.clone(),
            sort: request.sort,
            after: None,
            done: false,
            seen: HashSet::new(),
        };
        into_stream(cursor, request.limit)
    }
}

struct RedditCursor<'a> {
    extractor: &'a RedditExtractor,
    target: Target,
    sort: Option<SortOrder>,
    after: Option<String>,
    done: bool,
    seen: HashSet<String>,
}

#[async_trait]
impl Cursor for RedditCursor<'_> {
    async fn next_page(&mut self, remaining: usize) -> Result<Option<Page>, ExtractError> {
        if self.done {
            return Ok(None);
        }

        let page_size = remaining.clamp(1, MAX_PAGE_SIZE);
        let url = self.extractor.listing_url(
            &self.target,
            self.sort,
            page_size,
            self.after.as_deref(),
        )?;
        let listing = self.extractor.fetch_listing(&url).await?;

        self.after = listing.data.after;
        if self.after.is_none() || listing.data.children.is_empty() {
            self.done = true;
        }
        if listing.data.children.is_empty() {
            return Ok(None);
        }

        let page: Page = listing
            .data
            .children
            .into_iter()
            .filter(|child| self.seen.insert(child.data.id.clone()))
            .map(|child| Ok(to_raw_post(child.data)))
            .collect();

        tracing::debug!(posts = page.len(), more = !self.done, "fetched reddit page");
        Ok(Some(page))
    }
}

/// `rising` has no search equivalent, so it and an unset sort fall back to
/// relevance.
fn search_sort(sort: Option<SortOrder>) -> &'static str {
    match sort {
        Some(SortOrder::Hot) => "hot",
        Some(SortOrder::New) => "new",
        Some(SortOrder::Top) => "top",
        Some(SortOrder::Rising) | None => "relevance",
    }
}

fn normalize_subreddit(name: &str) -> Result<&str, ExtractError> {
    let trimmed = name.trim();
    let trimmed = trimmed
        .strip_prefix("/r/")
        .or_else(|| trimmed.strip_prefix("r/"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ExtractError::InvalidTarget {
            platform: Platform::Reddit,
            reason: format!("'{name}' is not a valid subreddit name"),
        });
    }
    Ok(trimmed)
}

fn classify(err: ExtractError) -> ExtractError {
    match err {
        ExtractError::Rejected { status: 404, url, .. } => ExtractError::InvalidTarget {
            platform: Platform::Reddit,
            reason: format!("{url} not found"),
        },
        ExtractError::Rejected {
            status: status @ (401 | 403),
            body,
            ..
        } => ExtractError::AuthRejected {
            platform: Platform::Reddit,
            reason: format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
        },
        other => other,
    }
}

fn to_raw_post(data: PostData) -> RawPost {
    let text = if data.selftext.trim().is_empty() {
        data.title.clone()
    } else {
        format!("{}\n\n{}", data.title, data.selftext)
    };

    #[allow(clippy::cast_possible_truncation)]
    let timestamp = data
        .created_utc
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| DateTime::from_timestamp(secs.trunc() as i64, 0));

    let thumbnail = data.thumbnail.filter(|t| t.starts_with("http"));
    let preview = data
        .preview
        .and_then(|p| p.images.into_iter().next())
        .and_then(|img| img.source)
        .and_then(|src| src.url)
        .map(|url| html_escape::decode_html_entities(&url).into_owned());

    let mut extra = ExtraFields::new();
    if let Some(subreddit) = data.subreddit {
        extra.insert("subreddit".to_string(), subreddit.into());
    }
    if let Some(ratio) = data.upvote_ratio {
        extra.insert("upvote_ratio".to_string(), ratio.into());
    }
    if let Some(flair) = data.link_flair_text.filter(|f| !f.trim().is_empty()) {
        extra.insert("flair".to_string(), flair.into());
    }

    RawPost {
        post_id: data.id,
        platform: Platform::Reddit,
        text,
        author: data.author.unwrap_or_else(|| "[deleted]".to_string()),
        timestamp,
        likes: data.score.map(|s| u64::try_from(s).unwrap_or(0)),
        comments: data.num_comments,
        media_url: preview.or(thumbnail),
        url: format!("{PERMALINK_BASE}{}", data.permalink),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_data(value: serde_json::Value) -> PostData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn search_sort_maps_rising_and_unset_to_relevance() {
        assert_eq!(search_sort(None), "relevance");
        assert_eq!(search_sort(Some(SortOrder::Rising)), "relevance");
        assert_eq!(search_sort(Some(SortOrder::Top)), "top");
    }

    #[test]
    fn normalize_subreddit_strips_prefix() {
        assert_eq!(normalize_subreddit("r/rust").unwrap(), "rust");
        assert_eq!(normalize_subreddit(" /r/Ask_Science/ ").unwrap(), "Ask_Science");
    }

    #[test]
    fn normalize_subreddit_rejects_bad_names() {
        assert!(matches!(
            normalize_subreddit("rust; drop"),
            Err(ExtractError::InvalidTarget { .. })
        ));
        assert!(normalize_subreddit("").is_err());
    }

    #[test]
    fn to_raw_post_combines_title_and_body() {
        let post = to_raw_post(post_data(serde_json::json!({
            "id": "abc",
            "title": "Title",
            "selftext": "Body",
            "author": "someone",
            "score": 12,
            "num_comments": 3,
            "created_utc": 1_700_000_000.0,
            "permalink": "/r/rust/comments/abc/title/",
            "subreddit": "rust",
            "upvote_ratio": 0.97,
            "link_flair_text": "News"
        })));
        assert_eq!(post.text, "Title\n\nBody");
        assert_eq!(post.likes, Some(12));
        assert_eq!(post.comments, Some(3));
        assert_eq!(post.url, "https://reddit.com/r/rust/comments/abc/title/");
        assert_eq!(post.timestamp.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(post.extra["subreddit"], "rust");
        assert_eq!(post.extra["flair"], "News");
    }

    #[test]
    fn to_raw_post_prefers_unescaped_preview_image() {
        let post = to_raw_post(post_data(serde_json::json!({
            "id": "img",
            "title": "Pic",
            "thumbnail": "https://b.thumbs.redditmedia.com/t.jpg",
            "preview": {"images": [{"source": {"url": "https://preview.redd.it/x.jpg?width=640&amp;s=abc"}}]}
        })));
        assert_eq!(
            post.media_url.as_deref(),
            Some("https://preview.redd.it/x.jpg?width=640&s=abc")
        );
    }

    #[test]
    fn to_raw_post_ignores_placeholder_thumbnails() {
        let post = to_raw_post(post_data(serde_json::json!({
            "id": "self",
            "title": "Text only",
            "thumbnail": "self",
            "score": -4
        })));
        assert!(post.media_url.is_none());
        assert_eq!(post.likes, Some(0));
        assert_eq!(post.author, "[deleted]");
        assert!(post.timestamp.is_none());
    }

    #[test]
    fn classify_maps_status_codes() {
        let not_found = classify(ExtractError::Rejected {
            status: 404,
            url: "u".to_string(),
            body: String::new(),
        });
        assert!(matches!(not_found, ExtractError::InvalidTarget { .. }));

        let forbidden = classify(ExtractError::Rejected {
            status: 403,
            url: "u".to_string(),
            body: "private".to_string(),
        });
        assert!(matches!(forbidden, ExtractError::AuthRejected { .. }));
    }
}
