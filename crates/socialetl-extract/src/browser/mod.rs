//! Headless-browser collaborator for sources without a usable API.
//!
//! Extractors drive a page through [`BrowserSession`] and read everything
//! back as JSON from injected scripts. [`ChromeLauncher`] is the production
//! implementation; tests substitute scripted sessions.

mod chrome;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ExtractError;

pub use chrome::ChromeLauncher;

/// Consecutive rounds with no height change and no new item before a feed
/// is considered finished.
pub const STALLED_ROUNDS: u32 = 3;

/// Consecutive rounds with no new item before a feed is considered finished,
/// even while the page keeps growing.
pub const IDLE_ROUNDS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl SessionCookie {
    #[must_use]
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
        }
    }
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start a fresh browser with its own profile.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::BrowserUnavailable`] if no browser can be started.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ExtractError>;
}

/// One live browser with a main tab.
///
/// Steps take `&self` so they can be re-run from retry closures.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the main tab, setting `cookies` first.
    async fn open(&self, url: &str, cookies: &[SessionCookie]) -> Result<(), ExtractError>;

    /// Run `script` in the main tab and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, ExtractError>;

    /// Scroll the main tab to the bottom. Returns the new document height.
    async fn scroll(&self) -> Result<u64, ExtractError>;

    /// Open `url` in a separate tab, run `script`, close the tab.
    async fn inspect(&self, url: &str, script: &str) -> Result<serde_json::Value, ExtractError>;

    async fn close(&mut self) -> Result<(), ExtractError>;
}

/// What the feed scripts return.
///
/// `ready` is false while the page has not rendered the feed container yet.
#[derive(Debug, Deserialize)]
pub(crate) struct FeedSnapshot<T> {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub height: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Decode a feed snapshot, treating an unrendered feed as a transient miss.
pub(crate) fn parse_snapshot<T>(
    value: serde_json::Value,
    page: &str,
) -> Result<FeedSnapshot<T>, ExtractError>
where
    T: for<'de> Deserialize<'de>,
{
    let snapshot: FeedSnapshot<T> =
        serde_json::from_value(value).map_err(|e| ExtractError::Deserialize {
            context: format!("feed snapshot from {page}"),
            source: e,
        })?;
    if snapshot.ready {
        Ok(snapshot)
    } else {
        Err(ExtractError::ElementMissing(page.to_string()))
    }
}

/// A page element that was still missing after every retry never rendered,
/// which is a permanent failure.
pub(crate) fn never_rendered(err: ExtractError) -> ExtractError {
    match err {
        ExtractError::Exhausted { last, context, .. }
            if matches!(*last, ExtractError::ElementMissing(_)) =>
        {
            ExtractError::ElementNotFound(context)
        }
        other => other,
    }
}

/// Tracks scroll rounds and decides when an infinite feed has run dry.
#[derive(Debug, Default)]
pub struct FeedProgress {
    seen: HashSet<String>,
    last_height: Option<u64>,
    stalled: u32,
    idle: u32,
}

impl FeedProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key. Returns `true` the first time it is seen.
    pub fn insert(&mut self, key: &str) -> bool {
        self.seen.insert(key.to_string())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Close a scroll round. Returns `true` when the feed should be treated
    /// as finished.
    pub fn end_round(&mut self, height: u64, new_items: usize) -> bool {
        let height_changed = self.last_height != Some(height);
        self.last_height = Some(height);

        if new_items > 0 {
            self.stalled = 0;
            self.idle = 0;
            return false;
        }

        self.idle += 1;
        if height_changed {
            self.stalled = 0;
        } else {
            self.stalled += 1;
        }
        self.stalled >= STALLED_ROUNDS || self.idle >= IDLE_ROUNDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_ends_after_three_stalled_rounds() {
        let mut progress = FeedProgress::new();
        assert!(!progress.end_round(1000, 5));
        assert!(!progress.end_round(1000, 0));
        assert!(!progress.end_round(1000, 0));
        assert!(progress.end_round(1000, 0));
    }

    #[test]
    fn new_items_reset_the_stall_counter() {
        let mut progress = FeedProgress::new();
        progress.end_round(1000, 1);
        progress.end_round(1000, 0);
        progress.end_round(1000, 0);
        assert!(!progress.end_round(1000, 2));
        assert!(!progress.end_round(1000, 0));
    }

    #[test]
    fn growing_page_without_new_items_ends_after_idle_limit() {
        let mut progress = FeedProgress::new();
        let mut ended_at = None;
        for round in 1..=20u64 {
            if progress.end_round(round * 100, 0) {
                ended_at = Some(round);
                break;
            }
        }
        assert_eq!(ended_at, Some(u64::from(IDLE_ROUNDS)));
    }

    #[test]
    fn insert_reports_first_sighting_only() {
        let mut progress = FeedProgress::new();
        assert!(progress.insert("abc"));
        assert!(!progress.insert("abc"));
        assert!(progress.contains("abc"));
    }

    #[test]
    fn unready_snapshot_is_element_missing() {
        let value = serde_json::json!({"ready": false, "height": 0, "items": []});
        let err = parse_snapshot::<serde_json::Value>(value, "https://x.com/search").unwrap_err();
        assert!(matches!(err, ExtractError::ElementMissing(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn exhausted_element_missing_becomes_not_found() {
        let err = never_rendered(ExtractError::Exhausted {
            context: "twitter timeline".to_string(),
            attempts: 2,
            last: Box::new(ExtractError::ElementMissing("x.com".to_string())),
        });
        assert!(matches!(err, ExtractError::ElementNotFound(ref c) if c == "twitter timeline"));
        assert!(err.is_permanent());
    }

    #[test]
    fn other_exhaustion_passes_through() {
        let err = never_rendered(ExtractError::Exhausted {
            context: "twitter scroll".to_string(),
            attempts: 2,
            last: Box::new(ExtractError::Timeout {
                step: "scroll".to_string(),
                secs: 1,
            }),
        });
        assert!(matches!(err, ExtractError::Exhausted { .. }));
    }

    #[test]
    fn ready_snapshot_decodes_items() {
        let value = serde_json::json!({"ready": true, "height": 1200, "items": [1, 2]});
        let snapshot = parse_snapshot::<u32>(value, "page").unwrap();
        assert_eq!(snapshot.height, 1200);
        assert_eq!(snapshot.items, vec![1, 2]);
    }
}
