use std::path::PathBuf;

use thiserror::Error;

use crate::app_config::{AppConfig, Credentials, Environment, RateLimitConfig};
use crate::scoring::ScoringConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read scoring file {path}: {source}")]
    ScoringFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scoring file: {0}")]
    ScoringFileParse(#[source] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is invalid or the scoring file cannot be loaded.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Does not read `.env`.
///
/// # Errors
///
/// Returns `ConfigError` if a value is invalid or the scoring file cannot be loaded.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration from an env-var lookup function.
///
/// Kept separate from the process environment so tests can pass a `HashMap`.
pub(crate) fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = or_default("DATABASE_URL", "sqlite://social_media.db");
    let env = parse_environment(&or_default("SOCIALETL_ENV", "development"));
    let log_level = or_default("SOCIALETL_LOG_LEVEL", "info");
    let export_dir = PathBuf::from(or_default("SOCIALETL_EXPORT_DIR", "./exports"));
    let thumbnail_dir = PathBuf::from(or_default("SOCIALETL_THUMBNAIL_DIR", "./thumbnails"));
    let output_file = or_default("SOCIALETL_OUTPUT_FILE", "metadata.csv");

    let db_max_connections = parse_u32("SOCIALETL_DB_MAX_CONNECTIONS", "5")?;
    if db_max_connections == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SOCIALETL_DB_MAX_CONNECTIONS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let db_acquire_timeout_secs = parse_u64("SOCIALETL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let request_timeout_secs = parse_u64("SOCIALETL_REQUEST_TIMEOUT_SECS", "30")?;
    let browser_step_timeout_secs = parse_u64("SOCIALETL_BROWSER_STEP_TIMEOUT_SECS", "45")?;
    let user_agent = or_default("SOCIALETL_USER_AGENT", "socialetl/0.1 (research)");
    let max_retries = parse_u32("SOCIALETL_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("SOCIALETL_RETRY_BACKOFF_BASE_MS", "1000")?;

    let batch_size = parse_u64("SOCIALETL_BATCH_SIZE", "100")?;
    if batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SOCIALETL_BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let batch_size = usize::try_from(batch_size).map_err(|e| ConfigError::InvalidEnvVar {
        var: "SOCIALETL_BATCH_SIZE".to_string(),
        reason: e.to_string(),
    })?;

    let rate_limits = RateLimitConfig {
        reddit_ms: parse_u64("SOCIALETL_RATE_LIMIT_REDDIT_MS", "2000")?,
        twitter_ms: parse_u64("SOCIALETL_RATE_LIMIT_TWITTER_MS", "2500")?,
        instagram_ms: parse_u64("SOCIALETL_RATE_LIMIT_INSTAGRAM_MS", "3000")?,
        youtube_ms: parse_u64("SOCIALETL_RATE_LIMIT_YOUTUBE_MS", "3000")?,
    };

    let scoring = match optional("SOCIALETL_SCORING_PATH") {
        Some(path) => ScoringConfig::load(&PathBuf::from(path))?,
        None => ScoringConfig::default(),
    };

    let credentials = Credentials {
        youtube_api_key: optional("YOUTUBE_API_KEY"),
        twitter_auth_token: optional("TWITTER_AUTH_TOKEN"),
        twitter_ct0: optional("TWITTER_CT0"),
        instagram_session_id: optional("INSTAGRAM_SESSION_ID"),
    };

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        export_dir,
        thumbnail_dir,
        output_file,
        db_max_connections,
        db_acquire_timeout_secs,
        request_timeout_secs,
        browser_step_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        batch_size,
        rate_limits,
        scoring,
        credentials,
    })
}

/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
