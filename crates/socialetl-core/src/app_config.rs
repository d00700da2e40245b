use std::path::PathBuf;
use std::time::Duration;

use crate::model::Platform;
use crate::scoring::ScoringConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Minimum spacing between two network actions against the same platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub reddit_ms: u64,
    pub twitter_ms: u64,
    pub instagram_ms: u64,
    pub youtube_ms: u64,
}

impl RateLimitConfig {
    #[must_use]
    pub fn interval_for(&self, platform: Platform) -> Duration {
        let ms = match platform {
            Platform::Reddit => self.reddit_ms,
            Platform::Twitter => self.twitter_ms,
            Platform::Instagram => self.instagram_ms,
            Platform::Youtube => self.youtube_ms,
        };
        Duration::from_millis(ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reddit_ms: 2000,
            twitter_ms: 2500,
            instagram_ms: 3000,
            youtube_ms: 3000,
        }
    }
}

/// Secrets handed to the extractors. Never printed.
#[derive(Clone, Default)]
pub struct Credentials {
    pub youtube_api_key: Option<String>,
    pub twitter_auth_token: Option<String>,
    pub twitter_ct0: Option<String>,
    pub instagram_session_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("Credentials")
            .field("youtube_api_key", &redact(&self.youtube_api_key))
            .field("twitter_auth_token", &redact(&self.twitter_auth_token))
            .field("twitter_ct0", &redact(&self.twitter_ct0))
            .field("instagram_session_id", &redact(&self.instagram_session_id))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub export_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub output_file: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub browser_step_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub batch_size: usize,
    pub rate_limits: RateLimitConfig,
    pub scoring: ScoringConfig,
    pub credentials: Credentials,
}
