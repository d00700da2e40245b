//! Instagram hashtag pages: collect post links from the explore grid, then
//! open each post to read its details.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use serde::Deserialize;
use socialetl_core::{Credentials, ExtraFields, Platform, RawPost};

use super::{parse_metric_text, parse_timestamp};
use crate::browser::{never_rendered, parse_snapshot, BrowserLauncher, BrowserSession, FeedProgress, SessionCookie};
use crate::error::ExtractError;
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::source::{into_stream, Cursor, ExtractRequest, Page, PostStream, SourceExtractor, Target};

const SITE: &str = "https://www.instagram.com";
const COOKIE_DOMAIN: &str = ".instagram.com";

static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:p|reel)/([A-Za-z0-9_-]+)").expect("valid regex"));

static LIKES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d.,]+\s*[KMB]?)\s+likes?").expect("valid regex"));

/// Post links in the hashtag grid. Rendered once `main` exists; a tag with no
/// posts yields an empty list.
const GRID_SCRIPT: &str = r#"(() => {
  const links = Array.from(document.querySelectorAll('main a[href*="/p/"], main a[href*="/reel/"]'));
  return {
    ready: !!document.querySelector('main'),
    height: document.body.scrollHeight,
    items: links.map((a) => a.getAttribute('href')),
  };
})()"#;

const DETAIL_SCRIPT: &str = r#"(() => {
  const article = document.querySelector('article') || document.querySelector('main');
  if (!article) { return { ready: false }; }
  const caption = article.querySelector('h1') || article.querySelector('ul li span');
  const author = article.querySelector('header a[href^="/"]');
  const time = article.querySelector('time[datetime]');
  const likes = Array.from(article.querySelectorAll('section span, section a'))
    .map((el) => el.innerText || '')
    .find((t) => /likes?$/i.test(t.trim()));
  const img = article.querySelector('img[srcset], img[src*="cdninstagram"]');
  return {
    ready: true,
    caption: caption ? caption.innerText : '',
    author_href: author ? author.getAttribute('href') : null,
    datetime: time ? time.getAttribute('datetime') : null,
    likes: likes || null,
    image: img ? img.getAttribute('src') : null,
  };
})()"#;

#[derive(Debug, Deserialize)]
struct PostDetail {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    caption: String,
    author_href: Option<String>,
    datetime: Option<String>,
    likes: Option<String>,
    image: Option<String>,
}

/// Extracts hashtag posts from Instagram in a headless browser.
pub struct InstagramExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cookies: Vec<SessionCookie>,
}

impl InstagramExtractor {
    /// Authenticates with the `sessionid` cookie when it is set.
    #[must_use]
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        credentials: &Credentials,
    ) -> Self {
        let cookies = credentials
            .instagram_session_id
            .as_deref()
            .map(|id| vec![SessionCookie::new("sessionid", id, COOKIE_DOMAIN)])
            .unwrap_or_default();
        Self {
            launcher,
            limiter,
            retry,
            cookies,
        }
    }

    /// Explore page for a hashtag, with or without the leading `#`.
    #[must_use]
    pub fn tag_url(tag: &str) -> String {
        let tag = tag.trim().trim_start_matches('#');
        format!(
            "{SITE}/explore/tags/{}/",
            utf8_percent_encode(tag, NON_ALPHANUMERIC)
        )
    }

    fn post_url(shortcode: &str) -> String {
        format!("{SITE}/p/{shortcode}/")
    }
}

impl SourceExtractor for InstagramExtractor {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn extract<'a>(&'a self, request: &ExtractRequest) -> PostStream<'a> {
        tracing::info!(
            target_name = %request.target,
            limit = request.limit,
            authenticated = !self.cookies.is_empty(),
            "extracting from instagram"
        );
        let cursor = GridCursor {
            extractor: self,
            target: request.target.clone(),
            session: None,
            progress: FeedProgress::new(),
            done: false,
        };
        into_stream(cursor, request.limit)
    }
}

struct GridCursor<'a> {
    extractor: &'a InstagramExtractor,
    target: Target,
    session: Option<Box<dyn BrowserSession>>,
    progress: FeedProgress,
    done: bool,
}

impl GridCursor<'_> {
    fn url(&self) -> Result<String, ExtractError> {
        match &self.target {
            Target::Query(q) if !q.trim().trim_start_matches('#').is_empty() => {
                Ok(InstagramExtractor::tag_url(q))
            }
            _ => Err(ExtractError::InvalidTarget {
                platform: Platform::Instagram,
                reason: "a non-empty hashtag is required".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Cursor for GridCursor<'_> {
    async fn next_page(&mut self, remaining: usize) -> Result<Option<Page>, ExtractError> {
        if self.done {
            return Ok(None);
        }
        let url = self.url()?;
        let ex = self.extractor;

        let first_round = self.session.is_none();
        if first_round {
            let session = ex.launcher.launch().await?;
            let cookies = ex.cookies.as_slice();
            let opened = retry_with_backoff(ex.retry, "instagram tag page", || {
                let session = &*session;
                let url = url.as_str();
                async move {
                    ex.limiter.acquire(Platform::Instagram.as_str()).await;
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

        if !first_round {
            retry_with_backoff(ex.retry, "instagram scroll", || async move {
                ex.limiter.acquire(Platform::Instagram.as_str()).await;
                session.scroll().await
            })
            .await?;
        }

        let page_url = url.as_str();
        let snapshot = retry_with_backoff(ex.retry, "instagram grid", || async move {
            let value = session.evaluate(GRID_SCRIPT).await?;
            parse_snapshot::<Option<String>>(value, page_url)
        })
        .await
        .map_err(never_rendered)?;

        let mut fresh: Vec<String> = Vec::new();
        for href in snapshot.items.iter().flatten() {
            if let Some(code) = shortcode(href) {
                if !self.progress.contains(code) && !fresh.iter().any(|c| c == code) {
                    fresh.push(code.to_string());
                }
            }
        }
        fresh.truncate(remaining);

        let mut page = Page::new();
        for code in &fresh {
            self.progress.insert(code);
            let post_url = InstagramExtractor::post_url(code);
            let context = format!("instagram post {code}");
            let detail = retry_with_backoff(ex.retry, &context, || {
                let post_url = post_url.as_str();
                async move {
                    ex.limiter.acquire(Platform::Instagram.as_str()).await;
                    let value = session.inspect(post_url, DETAIL_SCRIPT).await?;
                    let detail: PostDetail =
                        serde_json::from_value(value).map_err(|e| ExtractError::Deserialize {
                            context: format!("post detail from {post_url}"),
                            source: e,
                        })?;
                    if detail.ready {
                        Ok(detail)
                    } else {
                        Err(ExtractError::ElementMissing(post_url.to_string()))
                    }
                }
            })
            .await;

            match detail {
                Ok(detail) => page.push(Ok(to_raw_post(code, detail))),
                Err(e) if e.is_permanent() => {
                    page.push(Err(e));
                    break;
                }
                Err(e) => {
                    tracing::warn!(shortcode = %code, error = %e, "skipping instagram post");
                    page.push(Err(e));
                }
            }
        }

        if self.progress.end_round(snapshot.height, fresh.len()) {
            tracing::debug!(height = snapshot.height, "instagram grid stopped growing");
            self.done = true;
        }
        Ok(Some(page))
    }

    async fn finish(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::debug!(error = %e, "failed to close instagram browser session");
            }
        }
    }
}

fn shortcode(href: &str) -> Option<&str> {
    SHORTCODE_RE
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Comment counts are not rendered reliably, so `comments` stays unknown.
fn to_raw_post(code: &str, detail: PostDetail) -> RawPost {
    let author = detail
        .author_href
        .as_deref()
        .map(|href| href.trim_matches('/').to_string())
        .unwrap_or_default();
    let likes = detail.likes.as_deref().and_then(|text| {
        LIKES_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_metric_text(m.as_str()))
    });

    RawPost {
        post_id: code.to_string(),
        platform: Platform::Instagram,
        text: detail.caption,
        author,
        timestamp: detail.datetime.as_deref().and_then(parse_timestamp),
        likes,
        comments: None,
        media_url: detail.image.filter(|src| !src.is_empty()),
        url: InstagramExtractor::post_url(code),
        extra: ExtraFields::new(),
    }
}
