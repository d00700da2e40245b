//! Per-key minimum-interval gate shared by every extractor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use socialetl_core::{Platform, RateLimitConfig};
use tokio::time::Instant;

/// Last grant instant for one key. `None` until the first grant.
type Slot = Arc<tokio::sync::Mutex<Option<Instant>>>;

/// Spaces network actions per key.
///
/// Callers on the same key queue on that key's async mutex; the map lock is
/// only held long enough to look up the slot, so different keys never wait
/// on each other.
#[derive(Debug)]
pub struct RateLimiter {
    intervals: HashMap<String, Duration>,
    default_interval: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(default_interval: Duration) -> Self {
        Self {
            intervals: HashMap::new(),
            default_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, key: impl Into<String>, interval: Duration) -> Self {
        self.intervals.insert(key.into(), interval);
        self
    }

    /// One interval per platform, keyed by the platform name.
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Platform::ALL.iter().fold(
            Self::new(config.interval_for(Platform::Reddit)),
            |limiter, platform| {
                limiter.with_interval(platform.as_str(), config.interval_for(*platform))
            },
        )
    }

    #[must_use]
    pub fn min_interval(&self, key: &str) -> Duration {
        self.intervals
            .get(key)
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// Waits until `min_interval(key)` has passed since the previous grant
    /// for `key`, then records a new grant.
    pub async fn acquire(&self, key: &str) {
        let slot = self.slot(key);
        let interval = self.min_interval(key);

        let mut last = slot.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(
                    key,
                    wait_ms = u64::try_from((ready_at - now).as_millis()).unwrap_or(u64::MAX),
                    "rate limiter waiting"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(30));
        let start = std::time::Instant::now();
        limiter.acquire("reddit").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn sequential_acquires_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = std::time::Instant::now();
        for _ in 0..3 {
            limiter.acquire("reddit").await;
        }
        assert!(
            start.elapsed() >= Duration::from_millis(100),
            "3 acquires at 50ms must take at least 100ms, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let limiter = Arc::new(
            RateLimiter::new(Duration::from_millis(10))
                .with_interval("slow", Duration::from_secs(30)),
        );
        limiter.acquire("slow").await;

        let waiting = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire("slow").await })
        };
        tokio::task::yield_now().await;

        let start = std::time::Instant::now();
        limiter.acquire("fast").await;
        limiter.acquire("fast").await;
        assert!(start.elapsed() < Duration::from_secs(5));
        waiting.abort();
    }

    #[tokio::test]
    async fn concurrent_callers_on_one_key_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(40)));
        let start = std::time::Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire("twitter").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn from_config_uses_platform_intervals() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        assert_eq!(limiter.min_interval("twitter"), Duration::from_millis(2500));
        assert_eq!(limiter.min_interval("youtube"), Duration::from_millis(3000));
    }
}
