use converter_core::{batch_count, plan_batches, ItemCategory, WorkItem};
use pretty_assertions::assert_eq;

fn items(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| WorkItem::new(format!("files/doc_{i:05}.docx"), ItemCategory::Convert))
        .collect()
}

#[test]
fn thousand_items_in_batches_of_four_hundred() {
    let batches = plan_batches(items(1000), 400);
    let sizes: Vec<_> = batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![400, 400, 200]);
    assert_eq!(batch_count(1000, 400), 3);

    let bounds: Vec<_> = batches.iter().map(|b| (b.index, b.start, b.end)).collect();
    assert_eq!(bounds, vec![(0, 0, 400), (1, 400, 800), (2, 800, 1000)]);
}

#[test]
fn batches_partition_the_list_for_many_shapes() {
    for n in [0usize, 1, 2, 7, 99, 100, 101, 1000, 1001] {
        for b in [1usize, 2, 3, 10, 100, 1000, 5000] {
            let source = items(n);
            let batches = plan_batches(source.clone(), b);
            let count = batch_count(n, b);
            assert_eq!(batches.len(), count, "n={n} b={b}");
            assert_eq!(count, n.div_ceil(b));

            let total: usize = batches.iter().map(|batch| batch.len()).sum();
            assert_eq!(total, n);
            if let Some(last) = batches.last() {
                assert_eq!(last.len(), n - b * (count - 1));
            }

            // No gaps, no overlaps, original order kept.
            let flattened: Vec<_> = batches.into_iter().flat_map(|batch| batch.items).collect();
            assert_eq!(flattened, source);
        }
    }
}

#[test]
fn batching_is_deterministic() {
    let first: Vec<_> = plan_batches(items(523), 50)
        .into_iter()
        .map(|b| (b.start, b.end))
        .collect();
    let second: Vec<_> = plan_batches(items(523), 50)
        .into_iter()
        .map(|b| (b.start, b.end))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn zero_batch_size_degrades_to_single_batch() {
    let batches = plan_batches(items(5), 0);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].number(), 1);
    assert_eq!(batches[0].len(), 5);
    assert_eq!(batch_count(5, 0), 0);
}
