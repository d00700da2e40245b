//! Twitter/X live search, read from the rendered timeline.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use serde::Deserialize;
use socialetl_core::{Credentials, ExtraFields, Platform, RawPost};

use super::{content_id, parse_metric_text, parse_timestamp};
use crate::browser::{
    never_rendered, parse_snapshot, BrowserLauncher, BrowserSession, FeedProgress, SessionCookie,
};
use crate::error::ExtractError;
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::source::{into_stream, Cursor, ExtractRequest, Page, PostStream, SourceExtractor, Target};

const SITE: &str = "https://x.com";
const COOKIE_DOMAIN: &str = ".x.com";

static STATUS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status/(\d+)").expect("valid regex"));

/// Reads every rendered tweet article. The page counts as rendered once the
/// timeline column exists, so a search with no matches yields an empty list.
/// Metric values are `null` when the button is missing and `""` when it shows
/// no count.
const TIMELINE_SCRIPT: &str = r#"(() => {
  const timeline = document.querySelector('[aria-label^="Timeline"], [data-testid="primaryColumn"]');
  const articles = Array.from(document.querySelectorAll('article[data-testid="tweet"]'));
  const metric = (el, id) => {
    const btn = el.querySelector(`[data-testid="${id}"]`);
    return btn ? (btn.innerText || '').trim() : null;
  };
  const items = articles.map((el) => {
    const text = el.querySelector('div[data-testid="tweetText"]');
    const user = el.querySelector('div[data-testid="User-Name"] a');
    const status = el.querySelector('a[href*="/status/"]');
    const time = el.querySelector('time');
    const img = el.querySelector('img[src*="pbs.twimg.com/media"]');
    return {
      text: text ? text.innerText : '',
      author_href: user ? user.getAttribute('href') : null,
      status_href: status ? status.getAttribute('href') : null,
      datetime: time ? time.getAttribute('datetime') : null,
      likes: metric(el, 'like'),
      replies: metric(el, 'reply'),
      retweets: metric(el, 'retweet'),
      image: img ? img.getAttribute('src') : null,
    };
  });
  return { ready: !!timeline, height: document.body.scrollHeight, items };
})()"#;

/// One tweet article as read by [`TIMELINE_SCRIPT`].
#[derive(Debug, Clone, Deserialize)]
struct TweetCard {
    #[serde(default)]
    text: String,
    author_href: Option<String>,
    status_href: Option<String>,
    datetime: Option<String>,
    likes: Option<String>,
    replies: Option<String>,
    retweets: Option<String>,
    image: Option<String>,
}

/// Extracts tweets from the live search timeline in a headless browser.
pub struct TwitterExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cookies: Vec<SessionCookie>,
}

impl TwitterExtractor {
    /// Authenticates with the `auth_token`/`ct0` cookie pair when both are set,
    /// otherwise browses anonymously.
    #[must_use]
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        credentials: &Credentials,
    ) -> Self {
        let cookies = match (&credentials.twitter_auth_token, &credentials.twitter_ct0) {
            (Some(token), Some(ct0)) => vec![
                SessionCookie::new("auth_token", token, COOKIE_DOMAIN),
                SessionCookie::new("ct0", ct0, COOKIE_DOMAIN),
            ],
            _ => Vec::new(),
        };
        Self {
            launcher,
            limiter,
            retry,
            cookies,
        }
    }

    /// Live ("latest") search URL for `query`.
    #[must_use]
    pub fn search_url(query: &str) -> String {
        format!(
            "{SITE}/search?q={}&src=typed_query&f=live",
            utf8_percent_encode(query.trim(), NON_ALPHANUMERIC)
        )
    }
}

impl SourceExtractor for TwitterExtractor {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn extract<'a>(&'a self, request: &ExtractRequest) -> PostStream<'a> {
        tracing::info!(
            target_name = %request.target,
            limit = request.limit,
            authenticated = !self.cookies.is_empty(),
            "extracting from twitter"
        );
        let cursor = TimelineCursor {
            extractor: self,
            target: request.target.clone(),
            session: None,
            progress: FeedProgress::new(),
            done: false,
        };
        into_stream(cursor, request.limit)
    }
}

struct TimelineCursor<'a> {
    extractor: &'a TwitterExtractor,
    target: Target,
    session: Option<Box<dyn BrowserSession>>,
    progress: FeedProgress,
    done: bool,
}

impl TimelineCursor<'_> {
    fn url(&self) -> Result<String, ExtractError> {
        match &self.target {
            Target::Query(q) if !q.trim().is_empty() => Ok(TwitterExtractor::search_url(q)),
            _ => Err(ExtractError::InvalidTarget {
                platform: Platform::Twitter,
                reason: "a non-empty search query is required".to_string(),
            }),
        }
    }

    async fn read_timeline(
        &self,
        session: &dyn BrowserSession,
        url: &str,
        scroll: bool,
    ) -> Result<(u64, Vec<TweetCard>), ExtractError> {
        let ex = self.extractor;
        if scroll {
            retry_with_backoff(ex.retry, "twitter scroll", || async move {
                ex.limiter.acquire(Platform::Twitter.as_str()).await;
                session.scroll().await
            })
            .await?;
        }

        let snapshot = retry_with_backoff(ex.retry, "twitter timeline", || async move {
            let value = session.evaluate(TIMELINE_SCRIPT).await?;
            parse_snapshot::<TweetCard>(value, url)
        })
        .await
        .map_err(never_rendered)?;
        Ok((snapshot.height, snapshot.items))
    }
}

#[async_trait]
impl Cursor for TimelineCursor<'_> {
    async fn next_page(&mut self, _remaining: usize) -> Result<Option<Page>, ExtractError> {
        if self.done {
            return Ok(None);
        }
        let url = self.url()?;
        let ex = self.extractor;

        let first_round = self.session.is_none();
        if first_round {
            let session = ex.launcher.launch().await?;
            let cookies = ex.cookies.as_slice();
            let opened = retry_with_backoff(ex.retry, "twitter search page", || {
                let session = &*session;
                let url = url.as_str();
                async move {
                    ex.limiter.acquire(Platform::Twitter.as_str()).await;
                    session.open(url, cookies).await
                }
            })
            .await;
            self.session = Some(session);
            opened?;
        }

        let Some(session) = self.session.as_deref() else {
            return Ok(None);
        };
        let (height, cards) = self.read_timeline(session, &url, !first_round).await?;

        let mut page = Page::new();
        for card in cards {
            let post = to_raw_post(card);
            if self.progress.insert(&post.post_id) {
                page.push(Ok(post));
            }
        }

        if self.progress.end_round(height, page.len()) {
            tracing::debug!(height, "twitter timeline stopped growing");
            self.done = true;
        }
        Ok(Some(page))
    }

    async fn finish(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::debug!(error = %e, "failed to close twitter browser session");
            }
        }
    }
}

fn to_raw_post(card: TweetCard) -> RawPost {
    let status_href = card.status_href.as_deref().unwrap_or_default();
    let post_id = STATUS_ID_RE
        .captures(status_href)
        .and_then(|c| c.get(1))
        .map_or_else(|| content_id(&card.text), |m| m.as_str().to_string());

    let url = if status_href.starts_with('/') {
        format!("{SITE}{status_href}")
    } else {
        status_href.to_string()
    };

    let author = card
        .author_href
        .as_deref()
        .map(|href| href.trim_matches('/').rsplit('/').next().unwrap_or_default().to_string())
        .unwrap_or_default();

    let mut extra = ExtraFields::new();
    if let Some(retweets) = card.retweets.as_deref().and_then(metric) {
        extra.insert("retweet_count".to_string(), retweets.into());
    }

    RawPost {
        post_id,
        platform: Platform::Twitter,
        author,
        timestamp: card.datetime.as_deref().and_then(parse_timestamp),
        likes: card.likes.as_deref().and_then(metric),
        comments: card.replies.as_deref().and_then(metric),
        media_url: card.image.filter(|src| !src.is_empty()),
        url,
        extra,
        text: card.text,
    }
}

/// A present button without a count means zero.
fn metric(text: &str) -> Option<u64> {
    if text.trim().is_empty() {
        Some(0)
    } else {
        parse_metric_text(text)
    }
}
