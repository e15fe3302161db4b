mod common;

use std::sync::Arc;

use common::{write_file, FakeConverter};
use converter_core::{ErrorKind, WorkItem};
use converter_engine::{ItemHandler, ItemProcessor, JobError, LocalDirStore, RemoteStore};
use tempfile::TempDir;

struct Fixture {
    source: TempDir,
    destination: TempDir,
    scratch: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            source: tempfile::tempdir().unwrap(),
            destination: tempfile::tempdir().unwrap(),
            scratch: tempfile::tempdir().unwrap(),
        }
    }

    fn processor(&self) -> ItemProcessor<FakeConverter> {
        let source: Arc<dyn RemoteStore> = Arc::new(LocalDirStore::new(self.source.path()));
        let destination: Arc<dyn RemoteStore> =
            Arc::new(LocalDirStore::new(self.destination.path()));
        ItemProcessor::new(
            3,
            source,
            destination,
            "",
            FakeConverter::default(),
            Some(self.scratch.path()),
        )
        .unwrap()
    }
}

fn scratch_is_empty(processor: &ItemProcessor<FakeConverter>) -> bool {
    walk_files(processor.scratch_dir()).is_empty()
}

fn walk_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(walk_files(&path));
        } else {
            found.push(path);
        }
    }
    found
}

#[tokio::test]
async fn converts_and_publishes_under_converted_folder() {
    let fx = Fixture::new();
    write_file(fx.source.path(), "files/letter.docx", b"dear reader");
    let mut processor = fx.processor();

    let item = WorkItem::classify("files/letter.docx").unwrap().with_size(999);
    let outcome = processor.handle(&item).await;

    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.worker_id, 3);
    // Listing size is replaced by the downloaded length.
    assert_eq!(outcome.size_bytes, 11);
    let published = std::fs::read(fx.destination.path().join("converted/letter.pdf")).unwrap();
    assert!(published.starts_with(b"%PDF-fake"));
    assert!(scratch_is_empty(&processor));
}

#[tokio::test]
async fn pdf_and_tiff_are_copied_unchanged() {
    let fx = Fixture::new();
    write_file(fx.source.path(), "files/scan.pdf", b"%PDF-1.7 original");
    write_file(fx.source.path(), "files/fax.TIFF", b"II*\0");
    let mut processor = fx.processor();

    for id in ["files/scan.pdf", "files/fax.TIFF"] {
        let outcome = processor.handle(&WorkItem::classify(id).unwrap()).await;
        assert!(outcome.success, "{outcome:?}");
    }

    let dest = fx.destination.path().join("converted");
    assert_eq!(std::fs::read(dest.join("scan.pdf")).unwrap(), b"%PDF-1.7 original");
    assert_eq!(std::fs::read(dest.join("fax.TIFF")).unwrap(), b"II*\0");
    assert!(scratch_is_empty(&processor));
}

#[tokio::test]
async fn missing_source_is_a_download_failure() {
    let fx = Fixture::new();
    let mut processor = fx.processor();

    let item = WorkItem::classify("files/gone.doc").unwrap().with_size(42);
    let outcome = processor.handle(&item).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::DownloadFailed));
    assert_eq!(outcome.size_bytes, 42);
    assert!(scratch_is_empty(&processor));
}

#[tokio::test]
async fn converter_failure_cleans_up_scratch() {
    let fx = Fixture::new();
    write_file(fx.source.path(), "files/broken.rtf", b"{\\rtf corrupt");
    let mut processor = fx.processor();

    let outcome = processor
        .handle(&WorkItem::classify("files/broken.rtf").unwrap())
        .await;

    assert_eq!(outcome.error_kind, Some(ErrorKind::ConversionFailed));
    assert!(outcome
        .error_message
        .as_deref()
        .unwrap()
        .contains("could not be loaded"));
    assert!(scratch_is_empty(&processor));
    assert!(!fx.destination.path().join("converted").exists());
}

#[tokio::test]
async fn unwritable_destination_is_an_upload_failure() {
    let fx = Fixture::new();
    write_file(fx.source.path(), "files/notes.txt", b"hello");
    // A plain file where the output folder should be.
    write_file(fx.destination.path(), "converted", b"not a folder");
    let mut processor = fx.processor();

    let outcome = processor
        .handle(&WorkItem::classify("files/notes.txt").unwrap())
        .await;

    assert_eq!(outcome.error_kind, Some(ErrorKind::UploadFailed));
    assert!(scratch_is_empty(&processor));
}

#[tokio::test]
async fn workers_get_distinct_scratch_directories() {
    let fx = Fixture::new();
    let a = fx.processor();
    let b = fx.processor();
    assert_ne!(a.scratch_dir(), b.scratch_dir());
    assert!(a.scratch_dir().starts_with(fx.scratch.path()));

    let scratch = a.scratch_dir().to_path_buf();
    drop(a);
    assert!(!scratch.exists());
}

#[test]
fn scratch_root_that_is_a_file_fails_worker_setup() {
    let fx = Fixture::new();
    let blocker = fx.scratch.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let source: Arc<dyn RemoteStore> = Arc::new(LocalDirStore::new(fx.source.path()));

    let result = ItemProcessor::new(
        7,
        source.clone(),
        source,
        "",
        FakeConverter::default(),
        Some(&blocker),
    );

    assert!(matches!(
        result,
        Err(JobError::WorkerSetup { worker_id: 7, .. })
    ));
}
