use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the worker pool and the batch orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_workers: usize,
    /// Below this many items the pool runs a single worker.
    pub min_items_for_parallel: usize,
    pub batch_size: usize,
    pub batch_delay_secs: u64,
    pub batching_enabled: bool,
    pub parallel_enabled: bool,
    pub progress_enabled: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            min_items_for_parallel: 4,
            batch_size: 1000,
            batch_delay_secs: 5,
            batching_enabled: true,
            parallel_enabled: true,
            progress_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,
    #[error("max_workers must be at least 1")]
    ZeroWorkers,
}

/// Advisory review of a configuration. Never blocks execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigReview {
    pub batch_size_ok: bool,
    pub worker_count_ok: bool,
    pub delay_ok: bool,
    pub recommendations: Vec<String>,
}

impl ConfigReview {
    pub fn is_clean(&self) -> bool {
        self.recommendations.is_empty()
    }
}

impl ProcessingConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    /// Hard errors that make a run impossible. The batch size only matters
    /// with batching enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batching_enabled && self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Worker count the pool will use for `item_count` items.
    pub fn effective_workers(&self, item_count: usize) -> usize {
        if item_count == 0 {
            return 0;
        }
        if !self.parallel_enabled || item_count < self.min_items_for_parallel {
            return 1;
        }
        self.max_workers.max(1).min(item_count)
    }

    /// Flags values outside the recommended ranges.
    pub fn review(&self) -> ConfigReview {
        let mut review = ConfigReview {
            batch_size_ok: true,
            worker_count_ok: true,
            delay_ok: true,
            recommendations: Vec::new(),
        };

        if self.batch_size < 100 {
            review.batch_size_ok = false;
            review
                .recommendations
                .push("Consider increasing batch_size to at least 100 for better efficiency".into());
        } else if self.batch_size > 10_000 {
            review.batch_size_ok = false;
            review
                .recommendations
                .push("Consider decreasing batch_size to prevent memory issues".into());
        }

        if self.max_workers < 4 {
            review.worker_count_ok = false;
            review
                .recommendations
                .push("Consider increasing max_workers to at least 4".into());
        } else if self.max_workers > 32 {
            review.worker_count_ok = false;
            review
                .recommendations
                .push("Consider decreasing max_workers to prevent resource exhaustion".into());
        }

        if self.batch_delay_secs < 1 {
            review.delay_ok = false;
            review
                .recommendations
                .push("Consider increasing batch_delay_secs to at least 1 second".into());
        } else if self.batch_delay_secs > 30 {
            review.delay_ok = false;
            review
                .recommendations
                .push("Consider decreasing batch_delay_secs for faster processing".into());
        }

        review
    }
}
