use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use converter_core::{KindTally, ProcessingOutcome};

/// Snapshot of the running totals of one aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTally {
    pub successes: usize,
    pub failures: usize,
    pub by_kind: KindTally,
}

impl RunTally {
    pub fn processed(&self) -> usize {
        self.successes + self.failures
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    tally: RunTally,
    processed: HashSet<String>,
}

/// Thread-safe outcome counters shared by every worker of a run.
///
/// Totals, the per-kind tally and the processed marker set live under a single
/// lock so a reader never sees them disagree.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one outcome and marks its item as processed.
    ///
    /// Returns `false` when the item had already been marked in this run.
    pub fn record(&self, outcome: &ProcessingOutcome) -> bool {
        let mut state = self.lock();
        if outcome.success {
            state.tally.successes += 1;
        } else {
            state.tally.failures += 1;
            if let Some(kind) = outcome.error_kind {
                state.tally.by_kind.record(kind);
            }
        }
        state.processed.insert(outcome.item_id.clone())
    }

    pub fn is_processed(&self, item_id: &str) -> bool {
        self.lock().processed.contains(item_id)
    }

    pub fn processed_count(&self) -> usize {
        self.lock().processed.len()
    }

    pub fn snapshot(&self) -> RunTally {
        self.lock().tally.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
