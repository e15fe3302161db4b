mod common;

use std::path::Path;

use common::{quiet_config, write_file, FakeConverter};
use converter_core::ErrorKind;
use converter_engine::{
    ConversionEngine, EngineSettings, FailureFilter, JobError, JobRequest, LocalDirStore,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

struct Dirs {
    monitor: tempfile::TempDir,
    source: tempfile::TempDir,
    destination: tempfile::TempDir,
    work: tempfile::TempDir,
}

impl Dirs {
    fn new() -> Self {
        engine_logging::initialize_for_tests();
        Self {
            monitor: tempfile::tempdir().unwrap(),
            source: tempfile::tempdir().unwrap(),
            destination: tempfile::tempdir().unwrap(),
            work: tempfile::tempdir().unwrap(),
        }
    }

    fn engine(&self) -> ConversionEngine {
        let settings = EngineSettings {
            processing: quiet_config(),
            monitor_location: self.monitor.path().display().to_string(),
            scratch_root: Some(self.work.path().join("scratch")),
            failure_log: self.work.path().join("failed_conversions.jsonl"),
            ..EngineSettings::default()
        };
        ConversionEngine::new(settings).with_converters(|_| FakeConverter::default())
    }

    fn request(&self) -> JobRequest {
        JobRequest {
            source: self.source.path().display().to_string(),
            destination: self.destination.path().display().to_string(),
        }
    }

    fn write_trigger(&self) {
        let body = format!(
            "# nightly run\nSOURCE_SAS_URL: {}\ndest_sas_url: {}\n",
            self.source.path().display(),
            self.destination.path().display()
        );
        write_file(
            self.monitor.path(),
            "config/start_conversion_1234.txt",
            body.as_bytes(),
        );
    }
}

fn seed_documents(root: &Path) {
    write_file(root, "files/a.docx", b"first");
    write_file(root, "files/b.pdf", b"%PDF-1.4");
    write_file(root, "files/nested/c.txt", b"third");
    write_file(root, "files/d.odt", b"corrupt body");
    write_file(root, "files/ignored.exe", b"MZ");
    write_file(root, "elsewhere/e.docx", b"not listed");
}

#[tokio::test]
async fn run_job_converts_supported_documents() {
    let dirs = Dirs::new();
    seed_documents(dirs.source.path());
    let engine = dirs.engine();

    let stats = engine
        .run_job(&dirs.request(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total_items, 4);
    assert_eq!(stats.successes, 3);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.failures_by_kind.get(ErrorKind::ConversionFailed), 1);

    let converted = dirs.destination.path().join("converted");
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        assert!(converted.join(name).is_file(), "{name} missing");
    }
    assert!(!converted.join("d.pdf").exists());
    assert!(!converted.join("e.pdf").exists());

    let failures = engine.failure_log().query(&FailureFilter::default()).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_id, "files/d.odt");
}

#[tokio::test]
async fn converted_items_are_skipped_by_later_jobs() {
    let dirs = Dirs::new();
    seed_documents(dirs.source.path());
    let engine = dirs.engine();

    engine
        .run_job(&dirs.request(), CancellationToken::new())
        .await
        .unwrap();
    let second = engine
        .run_job(&dirs.request(), CancellationToken::new())
        .await
        .unwrap();

    // Only the failed document is retried.
    assert_eq!(second.total_items, 1);
    assert_eq!(second.failures, 1);
}

#[tokio::test]
async fn poll_once_runs_the_triggered_job_and_consumes_the_trigger() {
    let dirs = Dirs::new();
    seed_documents(dirs.source.path());
    dirs.write_trigger();
    let engine = dirs.engine();
    let monitor = LocalDirStore::new(dirs.monitor.path());
    let cancel = CancellationToken::new();

    let stats = engine
        .poll_once(&monitor, &cancel)
        .await
        .unwrap()
        .expect("trigger present");

    assert_eq!(stats.successes, 3);
    assert!(!dirs
        .monitor
        .path()
        .join("config/start_conversion_1234.txt")
        .exists());
    assert!(engine.poll_once(&monitor, &cancel).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_trigger_is_reported_and_kept() {
    let dirs = Dirs::new();
    write_file(
        dirs.monitor.path(),
        "config/start_conversion_1234.txt",
        b"source_sas_url: https://acct.blob.core.windows.net/in?sv=1&sig=x\n",
    );
    let engine = dirs.engine();
    let monitor = LocalDirStore::new(dirs.monitor.path());

    let err = engine
        .poll_once(&monitor, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Trigger(_)), "{err}");
    assert!(dirs
        .monitor
        .path()
        .join("config/start_conversion_1234.txt")
        .exists());
}

#[tokio::test]
async fn missing_source_folder_aborts_with_listing_error() {
    let dirs = Dirs::new();
    let engine = dirs.engine();
    let request = JobRequest {
        source: dirs.work.path().join("absent").display().to_string(),
        destination: dirs.destination.path().display().to_string(),
    };

    let aborted = engine
        .run_job(&request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(aborted.source, JobError::Listing { .. }));
    assert_eq!(aborted.partial.processed(), 0);
}

#[tokio::test]
async fn watch_stops_when_cancelled() {
    let dirs = Dirs::new();
    let engine = dirs.engine();
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(std::time::Duration::from_secs(5), engine.watch(cancel))
        .await
        .expect("watch returns promptly")
        .unwrap();
}
