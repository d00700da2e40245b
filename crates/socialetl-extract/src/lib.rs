//! Extraction side of the ETL pipeline: rate limiting, retry, the HTTP and
//! browser collaborators, and one [`SourceExtractor`] per platform.

pub mod browser;
mod error;
mod http;
mod rate_limit;
mod retry;
mod source;
pub mod sources;

use std::sync::Arc;

use socialetl_core::AppConfig;

pub use browser::{BrowserLauncher, BrowserSession, ChromeLauncher, FeedProgress, SessionCookie};
pub use error::ExtractError;
pub use http::{JsonFetcher, ReqwestFetcher};
pub use rate_limit::RateLimiter;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use source::{ExtractRequest, PostStream, SourceExtractor, Target};
pub use sources::{
    parse_metric_text, InstagramExtractor, RedditExtractor, TwitterExtractor, YoutubeExtractor,
};

/// Build the production extractor for every platform from resolved config.
///
/// Browsers are launched lazily, on the first poll of a browser-backed
/// stream, so this succeeds on machines without Chrome.
///
/// # Errors
///
/// Returns [`ExtractError::Http`] if the HTTP client cannot be constructed.
pub fn build_extractors(
    config: &AppConfig,
    limiter: Arc<RateLimiter>,
) -> Result<Vec<Arc<dyn SourceExtractor>>, ExtractError> {
    let retry = RetryPolicy::new(config.max_retries, config.retry_backoff_base_ms);
    let fetcher: Arc<dyn JsonFetcher> = Arc::new(ReqwestFetcher::new(
        config.request_timeout_secs,
        &config.user_agent,
    )?);
    let launcher: Arc<dyn BrowserLauncher> = Arc::new(ChromeLauncher::new(
        &config.user_agent,
        config.browser_step_timeout_secs,
    ));

    Ok(vec![
        Arc::new(RedditExtractor::new(
            Arc::clone(&fetcher),
            Arc::clone(&limiter),
            retry,
        )?),
        Arc::new(TwitterExtractor::new(
            Arc::clone(&launcher),
            Arc::clone(&limiter),
            retry,
            &config.credentials,
        )),
        Arc::new(YoutubeExtractor::new(
            fetcher,
            Arc::clone(&limiter),
            retry,
            config.credentials.youtube_api_key.clone(),
        )?),
        Arc::new(InstagramExtractor::new(
            launcher,
            limiter,
            retry,
            &config.credentials,
        )),
    ])
}
