use crate::WorkItem;

/// A contiguous, ordered slice of the job's item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based ordinal.
    pub index: usize,
    /// Offset of the first item in the full list.
    pub start: usize,
    /// Offset one past the last item.
    pub end: usize,
    pub items: Vec<WorkItem>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// One-based batch number used in logs and stats.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// `ceil(total / batch_size)`; zero items make zero batches.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

/// Splits `items` into contiguous batches of `batch_size` (the last may be shorter).
///
/// The partition is deterministic and covers every item exactly once. A
/// `batch_size` of zero is treated as one batch holding everything.
pub fn plan_batches(items: Vec<WorkItem>, batch_size: usize) -> Vec<Batch> {
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let size = if batch_size == 0 { total } else { batch_size };

    let mut batches = Vec::with_capacity(batch_count(total, size));
    let mut remaining = items.into_iter();
    let mut start = 0;
    while start < total {
        let end = (start + size).min(total);
        let chunk: Vec<WorkItem> = remaining.by_ref().take(end - start).collect();
        batches.push(Batch {
            index: batches.len(),
            start,
            end,
            items: chunk,
        });
        start = end;
    }
    batches
}
