//! Run orchestration: one extractor stream, transformed as it arrives and
//! loaded into the store in batches.

mod error;
mod report;
mod request;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use socialetl_core::{AppConfig, EnrichedPost, Platform};
use socialetl_db::Store;
use socialetl_extract::{build_extractors, RateLimiter, SourceExtractor};
use socialetl_transform::Transformer;

pub use error::PipelineError;
pub use report::{CancelHandle, RunReport, RunState};
pub use request::RunRequest;

/// Extractors keyed by platform, a shared transformer and the store.
///
/// Runs borrow the pipeline immutably, so several may execute at once and
/// share the rate limiter captured by the extractors.
pub struct Pipeline {
    extractors: HashMap<Platform, Arc<dyn SourceExtractor>>,
    transformer: Arc<Transformer>,
    store: Store,
    batch_size: usize,
}

impl Pipeline {
    /// Register `extractors` by the platform each reports. A later extractor
    /// for the same platform replaces an earlier one.
    #[must_use]
    pub fn new(
        extractors: Vec<Arc<dyn SourceExtractor>>,
        transformer: Transformer,
        store: Store,
        batch_size: usize,
    ) -> Self {
        let extractors = extractors
            .into_iter()
            .map(|extractor| (extractor.platform(), extractor))
            .collect();
        Self {
            extractors,
            transformer: Arc::new(transformer),
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Production wiring: one rate limiter shared by every extractor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Extract`] if an extractor cannot be built.
    pub fn from_config(config: &AppConfig, store: Store) -> Result<Self, PipelineError> {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limits));
        let extractors = build_extractors(config, limiter)?;
        Ok(Self::new(
            extractors,
            Transformer::new(&config.scoring),
            store,
            config.batch_size,
        ))
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Execute one run to completion or cancellation.
    ///
    /// Never returns an error: failures are recorded in the report, whose
    /// state is `Failed` after a permanent extraction error or a storage
    /// error. Posts transformed before a permanent extraction error are
    /// still loaded.
    pub async fn run(&self, request: &RunRequest, cancel: &CancelHandle) -> RunReport {
        let clock = Instant::now();
        let mut report = RunReport::new(request.platform, request.target.clone());
        tracing::info!(
            run_id = %report.run_id,
            platform = %request.platform,
            target = %request.target,
            limit = request.limit,
            "run started"
        );

        let failure = match self.extractors.get(&request.platform) {
            Some(extractor) => self.drive(extractor.as_ref(), request, cancel, &mut report).await,
            None => Some(PipelineError::UnsupportedPlatform(request.platform)),
        };

        match failure {
            Some(e) => {
                tracing::error!(run_id = %report.run_id, error = %e, "run failed");
                report.errors.push(e.to_string());
                report.enter(RunState::Failed);
            }
            None => report.enter(RunState::Done),
        }
        report.elapsed = clock.elapsed();

        tracing::info!(
            run_id = %report.run_id,
            platform = %report.platform,
            state = %report.state,
            cancelled = report.cancelled,
            extracted = report.extracted_count,
            loaded = report.loaded_count,
            duplicates = report.duplicate_count,
            skipped = report.skipped_count,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "run finished"
        );
        report
    }

    /// Pull, transform and batch until the stream ends, the run is
    /// cancelled or something fails. Returns the failure, if any.
    ///
    /// The stream is always closed before returning, so a browser session
    /// is released even when the run stops early.
    async fn drive(
        &self,
        extractor: &dyn SourceExtractor,
        request: &RunRequest,
        cancel: &CancelHandle,
        report: &mut RunReport,
    ) -> Option<PipelineError> {
        let mut stream = extractor.extract(&request.extract_request());
        let mut batch: Vec<EnrichedPost> = Vec::with_capacity(self.batch_size);
        let mut failure = None;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %report.run_id, "run cancelled");
                report.cancelled = true;
                break;
            }

            report.enter(RunState::Extracting);
            let Some(item) = stream.next().await else {
                break;
            };

            let raw = match item {
                Ok(raw) => raw,
                Err(e) if e.is_permanent() => {
                    failure = Some(PipelineError::Extract(e));
                    break;
                }
                Err(e) => {
                    tracing::warn!(run_id = %report.run_id, error = %e, "skipping item");
                    report.skipped_count += 1;
                    report.errors.push(e.to_string());
                    continue;
                }
            };

            report.extracted_count += 1;
            report.enter(RunState::Transforming);
            match self.transformer.accept(raw, &mut report.transform_stats) {
                Ok(post) => batch.push(post),
                Err(_) => report.skipped_count += 1,
            }

            if batch.len() >= self.batch_size {
                if let Err(e) = self.flush(&mut batch, report).await {
                    stream.close().await;
                    return Some(e);
                }
            }
        }
        stream.close().await;

        if let Err(e) = self.flush(&mut batch, report).await {
            // A storage error outranks the extraction error it followed.
            if let Some(previous) = failure.take() {
                report.errors.push(previous.to_string());
            }
            return Some(e);
        }
        failure
    }

    async fn flush(
        &self,
        batch: &mut Vec<EnrichedPost>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }
        report.enter(RunState::Loading);
        let inserted = self.store.load(batch).await?;
        let attempted = batch.len() as u64;
        report.loaded_count += inserted;
        report.duplicate_count += attempted.saturating_sub(inserted);
        tracing::debug!(
            run_id = %report.run_id,
            attempted,
            inserted,
            "batch loaded"
        );
        batch.clear();
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut platforms: Vec<_> = self.extractors.keys().copied().collect();
        platforms.sort();
        f.debug_struct("Pipeline")
            .field("platforms", &platforms)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
