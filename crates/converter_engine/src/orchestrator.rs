use std::sync::Arc;
use std::time::Instant;

use converter_core::{
    plan_batches, BatchStats, ConfigReview, JobEstimate, JobStats, ProcessingConfig, WorkItem,
    WorkerId,
};
use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::aggregator::ResultAggregator;
use crate::error::{JobAborted, JobError};
use crate::failure_log::FailureSink;
use crate::pool::{ItemHandler, WorkerPool};
use crate::progress::{NoopProgress, ProgressSink, TerminalProgress};

/// Runs a job as a sequence of batches through the worker pool.
///
/// Batch `i + 1` starts only after batch `i` has drained, with the configured
/// delay in between. Cancelling the token stops the job before the next batch
/// (or during the delay); the running batch always drains first.
pub struct BatchOrchestrator {
    config: ProcessingConfig,
    failures: Arc<dyn FailureSink>,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
}

/// Closes the progress display and flushes the log however the run ends.
struct RunCleanup {
    progress: Arc<dyn ProgressSink>,
}

impl Drop for RunCleanup {
    fn drop(&mut self) {
        self.progress.close();
        engine_logging::flush();
    }
}

impl BatchOrchestrator {
    pub fn new(config: ProcessingConfig, failures: Arc<dyn FailureSink>) -> Self {
        Self {
            config,
            failures,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `progress` instead of the sink derived from `progress_enabled`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn estimate(&self, total_items: usize) -> JobEstimate {
        JobEstimate::for_job(&self.config, total_items)
    }

    pub fn review(&self) -> ConfigReview {
        self.config.review()
    }

    /// Processes `items`, building one handler per worker and batch via `make_handler`.
    pub async fn run<H, F>(&self, items: Vec<WorkItem>, make_handler: F) -> Result<JobStats, JobAborted>
    where
        H: ItemHandler,
        F: Fn(WorkerId) -> Result<H, JobError>,
    {
        let started = Instant::now();
        let total_items = items.len();
        if let Err(e) = self.config.validate() {
            return Err(JobAborted {
                source: e.into(),
                partial: JobStats::new(total_items, 0),
            });
        }

        let batch_size = if self.config.batching_enabled {
            self.config.batch_size
        } else {
            0
        };
        let batches = plan_batches(items, batch_size);
        let total_batches = batches.len();
        let mut stats = JobStats::new(total_items, total_batches);

        let progress: Arc<dyn ProgressSink> = match &self.progress {
            Some(progress) => Arc::clone(progress),
            None if self.config.progress_enabled => {
                Arc::new(TerminalProgress::new(total_items as u64, "Converting"))
            }
            None => Arc::new(NoopProgress),
        };
        let _cleanup = RunCleanup {
            progress: Arc::clone(&progress),
        };

        let aggregator = Arc::new(ResultAggregator::new());
        let pool = WorkerPool::new(
            self.config.clone(),
            Arc::clone(&aggregator),
            Arc::clone(&self.failures),
            progress,
        );

        engine_info!(
            "Starting job: {total_items} items in {total_batches} batch(es) of up to {}",
            if batch_size == 0 { total_items } else { batch_size }
        );

        let abort = |source: JobError, mut partial: JobStats| {
            partial.elapsed = started.elapsed();
            engine_warn!(
                "Job stopped after {}/{} batches: {source}",
                partial.completed_batches(),
                partial.total_batches
            );
            JobAborted { source, partial }
        };

        for batch in batches {
            if self.cancel.is_cancelled() {
                return Err(abort(JobError::Interrupted, stats));
            }
            let number = batch.number();
            engine_info!(
                "Batch {number}/{total_batches}: items {}..{} ({} items)",
                batch.start + 1,
                batch.end,
                batch.len()
            );

            let report = match pool.run(batch.items, &make_handler).await {
                Ok(report) => report,
                Err(e) => return Err(abort(e, stats)),
            };
            engine_info!(
                "Batch {number}/{total_batches} done in {:.1}s: {} succeeded, {} failed, {} worker(s)",
                report.elapsed.as_secs_f64(),
                report.successes,
                report.failures,
                report.worker_count
            );
            stats.record_batch(BatchStats {
                batch_number: number,
                items_processed: report.processed(),
                successes: report.successes,
                failures: report.failures,
                elapsed: report.elapsed,
                worker_count: report.worker_count,
            });
            stats.failures_by_kind = aggregator.snapshot().by_kind;

            let delay = self.config.batch_delay();
            if number < total_batches && !delay.is_zero() {
                engine_debug!("Waiting {delay:?} before the next batch");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        return Err(abort(JobError::Interrupted, stats));
                    }
                }
            }
        }

        stats.elapsed = started.elapsed();
        log_summary(&stats);
        Ok(stats)
    }
}

fn log_summary(stats: &JobStats) {
    engine_info!(
        "Job finished in {:.1}s: {} items, {} succeeded, {} failed",
        stats.elapsed.as_secs_f64(),
        stats.total_items,
        stats.successes,
        stats.failures
    );
    for (kind, count) in stats.failures_by_kind.iter() {
        engine_info!("  {kind}: {count}");
    }
}
