//! Human-readable output for job results and the failure log.
use std::io::{self, Write};

use converter_core::{ConfigReview, JobEstimate, JobStats};
use converter_engine::{FailureRecord, FailureSummary};

pub fn write_job_stats(out: &mut impl Write, stats: &JobStats) -> io::Result<()> {
    writeln!(out, "Processing summary")?;
    writeln!(out, "  Total items:   {}", stats.total_items)?;
    writeln!(
        out,
        "  Batches:       {}/{}",
        stats.completed_batches(),
        stats.total_batches
    )?;
    writeln!(out, "  Succeeded:     {}", stats.successes)?;
    writeln!(out, "  Failed:        {}", stats.failures)?;
    writeln!(out, "  Elapsed:       {:.1}s", stats.elapsed.as_secs_f64())?;
    if stats.total_items > 0 {
        let rate = stats.successes as f64 / stats.total_items as f64 * 100.0;
        writeln!(out, "  Success rate:  {rate:.1}%")?;
    }
    for (kind, count) in stats.failures_by_kind.iter() {
        writeln!(out, "    {kind}: {count}")?;
    }
    for batch in &stats.batches {
        writeln!(
            out,
            "  Batch {}: {} items, {} ok, {} failed, {} worker(s), {:.1}s",
            batch.batch_number,
            batch.items_processed,
            batch.successes,
            batch.failures,
            batch.worker_count,
            batch.elapsed.as_secs_f64()
        )?;
    }
    Ok(())
}

pub fn write_failure_summary(out: &mut impl Write, summary: &FailureSummary) -> io::Result<()> {
    if summary.total == 0 {
        return writeln!(out, "No failures recorded.");
    }
    writeln!(out, "Failure summary")?;
    writeln!(out, "  Total failures:        {}", summary.total)?;
    writeln!(out, "  Unique items:          {}", summary.unique_items)?;
    writeln!(out, "  In the last 24 hours:  {}", summary.last_24_hours)?;
    for (kind, count) in summary.by_kind.iter() {
        writeln!(out, "    {kind}: {count}")?;
    }
    Ok(())
}

pub fn write_failure_records(out: &mut impl Write, records: &[FailureRecord]) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No matching failures.");
    }
    for record in records {
        writeln!(
            out,
            "{}  {:<18} {}  ({} bytes)",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.error_kind.as_str(),
            record.item_id,
            record.size_bytes
        )?;
        if !record.error_message.is_empty() {
            writeln!(out, "    {}", record.error_message)?;
        }
    }
    writeln!(out, "{} failure(s)", records.len())
}

pub fn write_estimate(out: &mut impl Write, items: usize, estimate: &JobEstimate) -> io::Result<()> {
    writeln!(out, "Estimate for {items} items")?;
    writeln!(out, "  Batches:          {}", estimate.estimated_batches)?;
    writeln!(out, "  Per item:         {:.2}s", estimate.seconds_per_item)?;
    writeln!(out, "  Per batch:        {:.0}s", estimate.time_per_batch_secs)?;
    writeln!(
        out,
        "  Total:            {:.0}s ({:.2} hours, {:.2} days)",
        estimate.estimated_time_secs,
        estimate.estimated_hours(),
        estimate.estimated_days()
    )?;
    writeln!(out, "  Memory:           ~{} MB", estimate.memory_usage_mb)
}

pub fn write_review(out: &mut impl Write, review: &ConfigReview) -> io::Result<()> {
    let verdict = |ok: bool| if ok { "ok" } else { "review" };
    writeln!(out, "Batch size:    {}", verdict(review.batch_size_ok))?;
    writeln!(out, "Worker count:  {}", verdict(review.worker_count_ok))?;
    writeln!(out, "Batch delay:   {}", verdict(review.delay_ok))?;
    if review.is_clean() {
        return writeln!(out, "Configuration looks good.");
    }
    for recommendation in &review.recommendations {
        writeln!(out, "  - {recommendation}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use converter_core::{BatchStats, ErrorKind, KindTally, ProcessingConfig};
    use std::time::Duration;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn job_stats_list_kinds_and_batches() {
        let mut stats = JobStats::new(10, 2);
        stats.record_batch(BatchStats {
            batch_number: 1,
            items_processed: 10,
            successes: 8,
            failures: 2,
            elapsed: Duration::from_secs(3),
            worker_count: 4,
        });
        let mut kinds = KindTally::default();
        kinds.record(ErrorKind::UploadFailed);
        kinds.record(ErrorKind::UploadFailed);
        stats.failures_by_kind = kinds;

        let text = render(|out| write_job_stats(out, &stats));
        assert!(text.contains("Batches:       1/2"), "{text}");
        assert!(text.contains("Success rate:  80.0%"));
        assert!(text.contains("UPLOAD_FAILED: 2"));
        assert!(text.contains("Batch 1: 10 items, 8 ok, 2 failed, 4 worker(s)"));
    }

    #[test]
    fn records_print_timestamp_kind_and_message() {
        let record = FailureRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 7, 9, 3, 18, 39).unwrap(),
            item_id: "files/a.doc".into(),
            error_kind: ErrorKind::ConversionFailed,
            error_message: "converter timed out".into(),
            size_bytes: 12,
            attempt_count: 1,
        };
        let text = render(|out| write_failure_records(out, &[record]));
        assert!(text.starts_with("2025-07-09 03:18:39  CONVERSION_FAILED"), "{text}");
        assert!(text.contains("    converter timed out"));
        assert!(text.ends_with("1 failure(s)\n"));

        let empty = render(|out| write_failure_records(out, &[]));
        assert_eq!(empty, "No matching failures.\n");
    }

    #[test]
    fn review_lists_recommendations() {
        let config = ProcessingConfig {
            max_workers: 64,
            ..ProcessingConfig::default()
        };
        let text = render(|out| write_review(out, &config.review()));
        assert!(text.contains("Worker count:  review"));
        assert!(text.contains("resource exhaustion"));

        let clean = render(|out| write_review(out, &ProcessingConfig::default().review()));
        assert!(clean.contains("Configuration looks good."));
    }

    #[test]
    fn estimate_shows_hours() {
        let estimate = JobEstimate::for_job(&ProcessingConfig::default(), 2400);
        let text = render(|out| write_estimate(out, 2400, &estimate));
        assert!(text.contains("Batches:          3"), "{text}");
        assert!(text.contains("Memory:           ~150 MB"));
    }
}
