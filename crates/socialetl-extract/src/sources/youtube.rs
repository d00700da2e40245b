//! YouTube Data API v3: `search.list` for ids, then one batched
//! `videos.list` per page for details and statistics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use socialetl_core::{ExtraFields, Platform, RawPost};

use super::parse_timestamp;
use crate::error::ExtractError;
use crate::http::JsonFetcher;
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::source::{into_stream, Cursor, ExtractRequest, Page, PostStream, SourceExtractor, Target};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const MAX_PAGE_SIZE: usize = 50;
const THUMBNAIL_PREFERENCE: [&str; 5] = ["maxres", "high", "medium", "standard", "default"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Video {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    channel_id: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// The API encodes counters as decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Extracts videos through the authenticated YouTube Data API.
pub struct YoutubeExtractor {
    fetcher: Arc<dyn JsonFetcher>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    api_key: Option<String>,
    base_url: Url,
}

impl YoutubeExtractor {
    /// # Errors
    ///
    /// Never fails with the built-in base URL; see [`Self::with_base_url`].
    pub fn new(
        fetcher: Arc<dyn JsonFetcher>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        api_key: Option<String>,
    ) -> Result<Self, ExtractError> {
        Self::with_base_url(fetcher, limiter, retry, api_key, DEFAULT_BASE_URL)
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
        api_key: Option<String>,
        base_url: &str,
    ) -> Result<Self, ExtractError> {
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ExtractError::InvalidTarget {
            platform: Platform::Youtube,
            reason: format!("invalid base URL '{base_url}': {e}"),
        })?;
        Ok(Self {
            fetcher,
            limiter,
            retry,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url,
        })
    }

    fn endpoint(&self, name: &str, params: &[(&str, &str)], key: &str) -> Result<Url, ExtractError> {
        let mut url = self.base_url.join(name).map_err(|e| ExtractError::InvalidTarget {
            platform: Platform::Youtube,
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", key);
        Ok(url)
    }

    async fn call(&self, url: &Url, context: &str) -> Result<serde_json::Value, ExtractError> {
        retry_with_backoff(self.retry, context, || async move {
            self.limiter.acquire(Platform::Youtube.as_str()).await;
            self.fetcher.get_json(url, &[]).await.map_err(classify)
        })
        .await
    }
}

impl SourceExtractor for YoutubeExtractor {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn extract<'a>(&'a self, request: &ExtractRequest) -> PostStream<'a> {
        tracing::info!(target_name = %request.target, limit = request.limit, "extracting from youtube");
        let cursor = YoutubeCursor {
            extractor: self,
            target: request.target.clone(),
            page_token: None,
            done: false,
        };
        into_stream(cursor, request.limit)
    }
}

struct YoutubeCursor<'a> {
    extractor: &'a YoutubeExtractor,
    target: Target,
    page_token: Option<String>,
    done: bool,
}

impl YoutubeCursor<'_> {
    fn query(&self) -> Result<&str, ExtractError> {
        match &self.target {
            Target::Query(q) if !q.trim().is_empty() => Ok(q.trim()),
            Target::Query(_) => Err(ExtractError::InvalidTarget {
                platform: Platform::Youtube,
                reason: "search query is empty".to_string(),
            }),
            Target::Subreddit(_) => Err(ExtractError::InvalidTarget {
                platform: Platform::Youtube,
                reason: "subreddits only apply to reddit".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Cursor for YoutubeCursor<'_> {
    async fn next_page(&mut self, remaining: usize) -> Result<Option<Page>, ExtractError> {
        if self.done {
            return Ok(None);
        }

        let ex = self.extractor;
        let key = ex.api_key.as_deref().ok_or_else(|| ExtractError::AuthRejected {
            platform: Platform::Youtube,
            reason: "YOUTUBE_API_KEY is not set".to_string(),
        })?;
        let query = self.query()?;

        let page_size = remaining.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("q", query),
            ("type", "video"),
            ("order", "relevance"),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = self.page_token.as_deref() {
            params.push(("pageToken", token));
        }
        let search_url = ex.endpoint("search", &params, key)?;
        let body = ex.call(&search_url, "youtube search.list").await?;
        let search: SearchResponse =
            serde_json::from_value(body).map_err(|e| ExtractError::Deserialize {
                context: "youtube search.list".to_string(),
                source: e,
            })?;

        self.page_token = search.next_page_token;
        if self.page_token.is_none() {
            self.done = true;
        }

        let ids: Vec<String> = search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();
        if ids.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let joined = ids.join(",");
        let details_url = ex.endpoint(
            "videos",
            &[("part", "snippet,contentDetails,statistics"), ("id", joined.as_str())],
            key,
        )?;
        let details = match ex.call(&details_url, "youtube videos.list").await {
            Ok(body) => body,
            Err(e @ ExtractError::Exhausted { .. }) => {
                tracing::warn!(videos = ids.len(), error = %e, "skipping page of youtube videos");
                return Ok(Some(vec![Err(e)]));
            }
            Err(e) => return Err(e),
        };
        let videos: VideosResponse =
            serde_json::from_value(details).map_err(|e| ExtractError::Deserialize {
                context: "youtube videos.list".to_string(),
                source: e,
            })?;

        let mut by_id: HashMap<String, Video> =
            videos.items.into_iter().map(|v| (v.id.clone(), v)).collect();
        let page: Page = ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|video| Ok(to_raw_post(video)))
            .collect();

        tracing::debug!(videos = page.len(), more = !self.done, "fetched youtube page");
        Ok(Some(page))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Map API rejections onto quota, throttling, auth and target errors.
fn classify(err: ExtractError) -> ExtractError {
    let ExtractError::Rejected { status, url, body } = err else {
        return err;
    };

    let parsed = serde_json::from_str::<ApiErrorBody>(&body).ok();
    let reason = parsed
        .as_ref()
        .and_then(|b| b.error.errors.first())
        .map(|d| d.reason.as_str())
        .unwrap_or_default();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .unwrap_or_default();
    let describe = || {
        if message.is_empty() {
            format!("HTTP {status} ({reason})")
        } else {
            format!("HTTP {status} ({reason}): {message}")
        }
    };

    match (status, reason) {
        (_, "quotaExceeded" | "dailyLimitExceeded" | "dailyLimitExceededUnreg") => {
            ExtractError::QuotaExhausted {
                platform: Platform::Youtube,
                reason: describe(),
            }
        }
        (_, "rateLimitExceeded" | "userRateLimitExceeded") => ExtractError::RateLimited {
            host: host_of(&url),
            retry_after_secs: 0,
        },
        (_, "keyInvalid" | "keyExpired" | "forbidden" | "accessNotConfigured")
        | (401 | 403, _) => ExtractError::AuthRejected {
            platform: Platform::Youtube,
            reason: describe(),
        },
        (400 | 404, _) => ExtractError::InvalidTarget {
            platform: Platform::Youtube,
            reason: describe(),
        },
        _ => ExtractError::Rejected { status, url, body },
    }
}

fn host_of(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

fn best_thumbnail(thumbnails: &HashMap<String, Thumbnail>) -> Option<String> {
    THUMBNAIL_PREFERENCE
        .iter()
        .find_map(|quality| thumbnails.get(*quality))
        .map(|t| t.url.clone())
}

fn parse_count(raw: Option<&String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

fn to_raw_post(video: Video) -> RawPost {
    let snippet = video.snippet;
    let text = if snippet.description.trim().is_empty() {
        snippet.title.clone()
    } else {
        format!("{}\n\n{}", snippet.title, snippet.description)
    };

    let mut extra = ExtraFields::new();
    if let Some(views) = parse_count(video.statistics.view_count.as_ref()) {
        extra.insert("view_count".to_string(), views.into());
    }
    if let Some(duration) = video.content_details.duration {
        extra.insert("duration".to_string(), duration.into());
    }
    if let Some(channel_id) = snippet.channel_id {
        extra.insert("channel_id".to_string(), channel_id.into());
    }

    RawPost {
        url: format!("{WATCH_URL}{}", video.id),
        post_id: video.id,
        platform: Platform::Youtube,
        text,
        author: snippet.channel_title,
        timestamp: snippet.published_at.as_deref().and_then(parse_timestamp),
        likes: parse_count(video.statistics.like_count.as_ref()),
        comments: parse_count(video.statistics.comment_count.as_ref()),
        media_url: best_thumbnail(&snippet.thumbnails),
        extra,
    }
}
