use socialetl_core::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {host} (retry after {retry_after_secs}s)")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("server error {status} from {url}")]
    ServerError { status: u16, url: String },

    /// Non-retriable HTTP status. `body` is truncated.
    #[error("request rejected with status {status} from {url}: {body}")]
    Rejected {
        status: u16,
        url: String,
        body: String,
    },

    #[error("{step} timed out after {secs}s")]
    Timeout { step: String, secs: u64 },

    /// The browser session detached or a protocol call failed.
    #[error("browser error: {0}")]
    Browser(String),

    /// The browser could not be started at all.
    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    /// The page has not rendered the expected elements yet.
    #[error("expected element missing on {0}")]
    ElementMissing(String),

    #[error("expected element never appeared on {0}")]
    ElementNotFound(String),

    #[error("{platform} rejected the credentials: {reason}")]
    AuthRejected { platform: Platform, reason: String },

    #[error("{platform} quota exhausted: {reason}")]
    QuotaExhausted { platform: Platform, reason: String },

    #[error("invalid {platform} target: {reason}")]
    InvalidTarget { platform: Platform, reason: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A transient failure that kept failing after every retry.
    #[error("{context} failed after {attempts} attempts: {last}")]
    Exhausted {
        context: String,
        attempts: u32,
        #[source]
        last: Box<ExtractError>,
    },
}

impl ExtractError {
    /// Worth retrying after a back-off delay.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_body()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            ExtractError::RateLimited { .. }
            | ExtractError::ServerError { .. }
            | ExtractError::Timeout { .. }
            | ExtractError::Browser(_)
            | ExtractError::ElementMissing(_) => true,
            ExtractError::Rejected { .. }
            | ExtractError::BrowserUnavailable(_)
            | ExtractError::ElementNotFound(_)
            | ExtractError::AuthRejected { .. }
            | ExtractError::QuotaExhausted { .. }
            | ExtractError::InvalidTarget { .. }
            | ExtractError::Deserialize { .. }
            | ExtractError::Exhausted { .. } => false,
        }
    }

    /// Ends the extraction stream. Exhausted items are skippable, everything
    /// else that is not transient is permanent.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient() && !matches!(self, ExtractError::Exhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_permanent_not_transient() {
        let err = ExtractError::QuotaExhausted {
            platform: Platform::Youtube,
            reason: "quotaExceeded".to_string(),
        };
        assert!(!err.is_transient());
        assert!(err.is_permanent());
    }

    #[test]
    fn exhausted_is_neither_transient_nor_permanent() {
        let err = ExtractError::Exhausted {
            context: "page".to_string(),
            attempts: 4,
            last: Box::new(ExtractError::ServerError {
                status: 503,
                url: "https://example.com".to_string(),
            }),
        };
        assert!(!err.is_transient());
        assert!(!err.is_permanent());
        assert!(err.to_string().contains("after 4 attempts"));
    }

    #[test]
    fn element_missing_is_transient() {
        assert!(ExtractError::ElementMissing("x.com".to_string()).is_transient());
        assert!(ExtractError::ElementNotFound("x.com".to_string()).is_permanent());
    }
}
