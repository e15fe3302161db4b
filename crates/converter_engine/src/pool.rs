use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use converter_core::{ErrorKind, ProcessingConfig, ProcessingOutcome, WorkItem, WorkerId};
use engine_logging::{engine_debug, engine_error, engine_warn};
use futures_util::FutureExt;
use tokio::task::JoinSet;

use crate::aggregator::ResultAggregator;
use crate::error::JobError;
use crate::failure_log::{FailureRecord, FailureSink};
use crate::progress::ProgressSink;

/// Processes one item to a terminal outcome. Owned by exactly one worker.
#[async_trait::async_trait]
pub trait ItemHandler: Send + 'static {
    async fn handle(&mut self, item: &WorkItem) -> ProcessingOutcome;
}

/// Result of draining one set of items through the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub worker_count: usize,
    pub successes: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

impl PoolReport {
    pub fn processed(&self) -> usize {
        self.successes + self.failures
    }
}

/// Sinks every worker reports into.
struct PoolShared {
    aggregator: Arc<ResultAggregator>,
    failures: Arc<dyn FailureSink>,
    progress: Arc<dyn ProgressSink>,
}

impl PoolShared {
    fn record(&self, outcome: &ProcessingOutcome) {
        if !self.aggregator.record(outcome) {
            engine_warn!("Item {} produced more than one outcome", outcome.item_id);
        }
        if let Some(record) = FailureRecord::from_outcome(outcome, Utc::now()) {
            engine_warn!(
                "{} failed ({}): {}",
                record.item_id,
                record.error_kind,
                record.error_message
            );
            if let Err(e) = self.failures.append(&record) {
                engine_error!("Could not record failure of {}: {e}", record.item_id);
            }
        }
        self.progress.advance(1);
    }
}

/// Runs item handlers over a set of items with bounded concurrency.
///
/// Workers pull from a shared queue, so at most `C` items are in flight and
/// each item is handed to exactly one worker.
pub struct WorkerPool {
    config: ProcessingConfig,
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    pub fn new(
        config: ProcessingConfig,
        aggregator: Arc<ResultAggregator>,
        failures: Arc<dyn FailureSink>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            config,
            shared: Arc::new(PoolShared {
                aggregator,
                failures,
                progress,
            }),
        }
    }

    pub fn aggregator(&self) -> &Arc<ResultAggregator> {
        &self.shared.aggregator
    }

    /// Drains `items`, building one handler per worker through `make_handler`.
    ///
    /// Per-item failures, panics included, become outcomes. An error is
    /// returned only when a worker could not be provisioned or died outside its
    /// handler (the inline sequential worker included); the remaining workers
    /// still drain the queue first.
    pub async fn run<H, F>(&self, items: Vec<WorkItem>, make_handler: &F) -> Result<PoolReport, JobError>
    where
        H: ItemHandler,
        F: Fn(WorkerId) -> Result<H, JobError>,
    {
        let started = Instant::now();
        let worker_count = self.config.effective_workers(items.len());
        if worker_count == 0 {
            return Ok(PoolReport::default());
        }
        let queue = Arc::new(Mutex::new(VecDeque::from(items)));

        let mut report = PoolReport {
            worker_count,
            ..PoolReport::default()
        };

        if worker_count == 1 {
            engine_debug!("Processing {} items sequentially", queue_len(&queue));
            let handler = make_handler(0)?;
            let drained = AssertUnwindSafe(worker_loop(
                handler,
                0,
                Arc::clone(&queue),
                Arc::clone(&self.shared),
            ))
            .catch_unwind()
            .await;
            let (successes, failures) = drained.map_err(|panic| {
                let message = format!("worker 0 panicked: {}", panic_message(panic.as_ref()));
                engine_error!("Worker task failed: {message}");
                JobError::WorkerCrashed(message)
            })?;
            report.successes = successes;
            report.failures = failures;
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        engine_debug!(
            "Processing {} items with {worker_count} workers",
            queue_len(&queue)
        );
        let mut handlers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            handlers.push(make_handler(worker_id)?);
        }

        let mut workers = JoinSet::new();
        for (worker_id, handler) in handlers.into_iter().enumerate() {
            workers.spawn(worker_loop(
                handler,
                worker_id,
                Arc::clone(&queue),
                Arc::clone(&self.shared),
            ));
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((successes, failures)) => {
                    report.successes += successes;
                    report.failures += failures;
                }
                Err(e) => {
                    engine_error!("Worker task failed: {e}");
                    first_error.get_or_insert(JobError::WorkerCrashed(e.to_string()));
                }
            }
        }
        report.elapsed = started.elapsed();
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

fn queue_len(queue: &Mutex<VecDeque<WorkItem>>) -> usize {
    queue.lock().unwrap_or_else(PoisonError::into_inner).len()
}

fn next_item(queue: &Mutex<VecDeque<WorkItem>>) -> Option<WorkItem> {
    queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
}

async fn worker_loop<H: ItemHandler>(
    mut handler: H,
    worker_id: WorkerId,
    queue: Arc<Mutex<VecDeque<WorkItem>>>,
    shared: Arc<PoolShared>,
) -> (usize, usize) {
    let mut successes = 0;
    let mut failures = 0;
    while let Some(item) = next_item(&queue) {
        shared.progress.set_label(item.file_name());
        let outcome = match AssertUnwindSafe(handler.handle(&item)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => ProcessingOutcome::failed(
                item.id.clone(),
                ErrorKind::ProcessingError,
                format!("handler panicked: {}", panic_message(panic.as_ref())),
                item.size_bytes,
                worker_id,
            ),
        };
        if outcome.success {
            successes += 1;
        } else {
            failures += 1;
        }
        shared.record(&outcome);
    }
    (successes, failures)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
