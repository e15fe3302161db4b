use crate::{batch_count, ProcessingConfig};

/// Observed throughput of a single worker, in seconds per document.
pub const SINGLE_WORKER_SECONDS_PER_ITEM: f64 = 1.5;
/// Rough resident memory attributed to each batch.
pub const MEMORY_PER_BATCH_MB: u64 = 50;

/// Rough projection of a job's duration and footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEstimate {
    pub estimated_batches: usize,
    pub seconds_per_item: f64,
    pub time_per_batch_secs: f64,
    pub estimated_time_secs: f64,
    pub memory_usage_mb: u64,
}

impl JobEstimate {
    /// Projects a job of `total_items` under `config`.
    ///
    /// Workers are assumed to reach half of linear speedup. Every batch is
    /// costed at full size, so the projection is an upper bound.
    pub fn for_job(config: &ProcessingConfig, total_items: usize) -> Self {
        let workers = if config.parallel_enabled {
            config.max_workers.max(1)
        } else {
            1
        };
        let speedup = (workers as f64 / 2.0).max(1.0);
        let seconds_per_item = SINGLE_WORKER_SECONDS_PER_ITEM / speedup;

        if !config.batching_enabled {
            let batches = usize::from(total_items > 0);
            let time = total_items as f64 * seconds_per_item;
            return Self {
                estimated_batches: batches,
                seconds_per_item,
                time_per_batch_secs: time,
                estimated_time_secs: time,
                memory_usage_mb: batches as u64 * MEMORY_PER_BATCH_MB,
            };
        }

        let batches = batch_count(total_items, config.batch_size);
        let time_per_batch_secs = config.batch_size as f64 * seconds_per_item;
        let delays = batches.saturating_sub(1) as f64 * config.batch_delay_secs as f64;
        Self {
            estimated_batches: batches,
            seconds_per_item,
            time_per_batch_secs,
            estimated_time_secs: batches as f64 * time_per_batch_secs + delays,
            memory_usage_mb: batches as u64 * MEMORY_PER_BATCH_MB,
        }
    }

    pub fn estimated_hours(&self) -> f64 {
        self.estimated_time_secs / 3600.0
    }

    pub fn estimated_days(&self) -> f64 {
        self.estimated_hours() / 24.0
    }
}
