use converter_core::{ConfigError, JobStats, WorkerId};

use crate::storage::StorageError;
use crate::trigger::TriggerError;

/// Job-level infrastructure errors. Per-item failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to list `{prefix}`: {source}")]
    Listing {
        prefix: String,
        #[source]
        source: StorageError,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),
    #[error("worker {worker_id} could not start: {message}")]
    WorkerSetup { worker_id: WorkerId, message: String },
    #[error("worker task failed: {0}")]
    WorkerCrashed(String),
    #[error("job interrupted")]
    Interrupted,
}

/// A job that stopped early, with the stats of the batches that did finish.
#[derive(Debug, thiserror::Error)]
#[error(
    "job aborted after {} of {} batches: {source}",
    .partial.completed_batches(),
    .partial.total_batches
)]
pub struct JobAborted {
    #[source]
    pub source: JobError,
    pub partial: JobStats,
}
