use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use socialetl_core::Platform;
use socialetl_extract::Target;
use socialetl_transform::TransformStats;
use uuid::Uuid;

/// Lifecycle of a run. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Done,
    Failed,
}

impl RunState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Extracting => "extracting",
            RunState::Transforming => "transforming",
            RunState::Loading => "loading",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one run. Produced for every run, failed or not.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub platform: Platform,
    pub target: Target,
    pub state: RunState,
    /// Stopped early by a [`CancelHandle`]. The run still ends in `Done`.
    pub cancelled: bool,
    /// Raw posts the extractor yielded.
    pub extracted_count: u64,
    /// Rows actually inserted.
    pub loaded_count: u64,
    /// Valid posts the store already held.
    pub duplicate_count: u64,
    /// Posts rejected by validation plus items the extractor gave up on.
    pub skipped_count: u64,
    pub transform_stats: TransformStats,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunReport {
    pub(crate) fn new(platform: Platform, target: Target) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            platform,
            target,
            state: RunState::Idle,
            cancelled: false,
            extracted_count: 0,
            loaded_count: 0,
            duplicate_count: 0,
            skipped_count: 0,
            transform_stats: TransformStats::default(),
            errors: Vec::new(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn enter(&mut self, state: RunState) {
        if self.state != state {
            tracing::trace!(run_id = %self.run_id, from = %self.state, to = %state, "run state");
            self.state = state;
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done
    }
}

/// Cooperative cancellation shared between a run and whoever may stop it.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let handle = CancelHandle::new();
        let observer = handle.clone();
        assert!(!observer.is_cancelled());
        handle.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn run_state_displays_lowercase() {
        assert_eq!(RunState::Done.to_string(), "done");
        assert_eq!(RunState::Transforming.to_string(), "transforming");
    }

    #[test]
    fn new_report_starts_idle_and_empty() {
        let report = RunReport::new(Platform::Reddit, Target::Subreddit("rust".to_string()));
        assert_eq!(report.state, RunState::Idle);
        assert!(!report.succeeded());
        assert_eq!(report.extracted_count, 0);
        assert!(report.errors.is_empty());
    }
}
