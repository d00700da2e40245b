//! JSON-over-HTTP collaborator used by the Reddit and YouTube extractors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::error::ExtractError;

/// Longest slice of a rejected response body kept in the error.
const MAX_ERROR_BODY: usize = 2_048;

#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// GET `url` and decode the body as JSON.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::RateLimited`] on HTTP 429.
    /// - [`ExtractError::ServerError`] on HTTP 5xx.
    /// - [`ExtractError::Rejected`] on any other non-2xx status.
    /// - [`ExtractError::Http`] on network failure.
    /// - [`ExtractError::Deserialize`] if the body is not JSON.
    async fn get_json(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, ExtractError>;
}

/// Production [`JsonFetcher`] on `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonFetcher for ReqwestFetcher {
    async fn get_json(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, ExtractError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ExtractError::RateLimited {
                host: url.host_str().unwrap_or_default().to_string(),
                retry_after_secs,
            });
        }

        if status.is_server_error() {
            return Err(ExtractError::ServerError {
                status: status.as_u16(),
                url: redact_url(url),
            });
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ExtractError::Rejected {
                status: status.as_u16(),
                url: redact_url(url),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ExtractError::Deserialize {
            context: redact_url(url),
            source: e,
        })
    }
}

/// Drops the `key` query parameter so API keys never reach logs or errors.
pub(crate) fn redact_url(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "key") {
        return url.to_string();
    }
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "key" { "[redacted]".into() } else { v };
            (k.into_owned(), v.into_owned())
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
