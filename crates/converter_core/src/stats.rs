use std::collections::BTreeMap;
use std::time::Duration;

use crate::ErrorKind;

/// Failure counts per kind, iterated in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindTally(BTreeMap<ErrorKind, usize>);

impl KindTally {
    pub fn record(&mut self, kind: ErrorKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    pub fn get(&self, kind: ErrorKind) -> usize {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorKind, usize)> + '_ {
        self.0.iter().map(|(kind, count)| (*kind, *count))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStats {
    /// One-based.
    pub batch_number: usize,
    pub items_processed: usize,
    pub successes: usize,
    pub failures: usize,
    pub elapsed: Duration,
    pub worker_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub total_items: usize,
    pub total_batches: usize,
    pub successes: usize,
    pub failures: usize,
    pub elapsed: Duration,
    pub failures_by_kind: KindTally,
    pub batches: Vec<BatchStats>,
}

impl JobStats {
    pub fn new(total_items: usize, total_batches: usize) -> Self {
        Self {
            total_items,
            total_batches,
            ..Self::default()
        }
    }

    /// Folds a finished batch into the job totals.
    pub fn record_batch(&mut self, batch: BatchStats) {
        self.successes += batch.successes;
        self.failures += batch.failures;
        self.batches.push(batch);
    }

    /// Items with a recorded outcome so far.
    pub fn processed(&self) -> usize {
        self.successes + self.failures
    }

    pub fn completed_batches(&self) -> usize {
        self.batches.len()
    }

    /// True once every item has an outcome.
    pub fn is_complete(&self) -> bool {
        self.processed() == self.total_items
    }
}
