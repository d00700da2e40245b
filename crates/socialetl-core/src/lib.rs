//! Shared domain types and configuration for the socialetl workspace.
//!
//! Every other crate speaks in terms of the post records defined in [`model`]
//! and reads its settings from the [`AppConfig`] resolved here.

mod app_config;
mod config;
pub mod model;
pub mod scoring;

pub use app_config::{AppConfig, Credentials, Environment, RateLimitConfig};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use model::{
    EngagementLevel, EnrichedPost, ExtraFields, ParseEnumError, Platform, RawPost, SentimentLabel,
    SortOrder, StoredPost,
};
pub use scoring::{EngagementThresholds, LexiconConfig, ScoringConfig};
