#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use converter_core::{ErrorKind, ProcessingOutcome, WorkItem, WorkerId};
use converter_engine::{
    ConversionError, ConversionService, FailureLogError, FailureRecord, FailureSink, ItemHandler,
    ProgressSink,
};

/// Failure sink that keeps records in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<FailureRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl FailureSink for MemorySink {
    fn append(&self, record: &FailureRecord) -> Result<(), FailureLogError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Failure sink whose every append panics.
pub struct ExplodingSink;

impl FailureSink for ExplodingSink {
    fn append(&self, _record: &FailureRecord) -> Result<(), FailureLogError> {
        panic!("failure log exploded");
    }
}

#[derive(Default)]
pub struct CountingProgress {
    pub advanced: AtomicU64,
    pub closed: AtomicUsize,
    pub labels: AtomicUsize,
}

impl ProgressSink for CountingProgress {
    fn advance(&self, n: u64) {
        self.advanced.fetch_add(n, Ordering::SeqCst);
    }

    fn set_label(&self, _label: &str) {
        self.labels.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared observations of every scripted handler of a run.
#[derive(Default)]
pub struct Script {
    pub seen: Mutex<Vec<String>>,
    pub download_failures: HashSet<String>,
    pub panics: HashSet<String>,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub delay: Option<Duration>,
}

impl Script {
    pub fn seen_sorted(&self) -> Vec<String> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort();
        seen
    }
}

/// Handler that succeeds unless the script says otherwise.
pub struct ScriptedHandler {
    pub worker_id: WorkerId,
    pub script: Arc<Script>,
}

#[async_trait::async_trait]
impl ItemHandler for ScriptedHandler {
    async fn handle(&mut self, item: &WorkItem) -> ProcessingOutcome {
        let active = self.script.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.peak.fetch_max(active, Ordering::SeqCst);
        self.script.seen.lock().unwrap().push(item.id.clone());
        if let Some(delay) = self.script.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.active.fetch_sub(1, Ordering::SeqCst);

        if self.script.panics.contains(&item.id) {
            panic!("corrupt document {}", item.id);
        }
        if self.script.download_failures.contains(&item.id) {
            return ProcessingOutcome::failed(
                item.id.clone(),
                ErrorKind::DownloadFailed,
                "blob not found",
                item.size_bytes,
                self.worker_id,
            );
        }
        ProcessingOutcome::succeeded(item.id.clone(), item.size_bytes, self.worker_id)
    }
}

pub fn items(count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|n| WorkItem::classify(format!("files/doc-{n:04}.docx")).unwrap())
        .collect()
}

/// Converter that writes `<stem>.pdf` next to nothing but the output dir.
/// Inputs containing `corrupt` fail.
#[derive(Default)]
pub struct FakeConverter {
    pub calls: usize,
}

#[async_trait::async_trait]
impl ConversionService for FakeConverter {
    async fn transform(
        &mut self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        self.calls += 1;
        let content = tokio::fs::read(input).await?;
        if content.windows(7).any(|w| w == b"corrupt") {
            return Err(ConversionError::Failed {
                status: "exit status: 1".into(),
                stderr: "source file could not be loaded".into(),
            });
        }
        tokio::fs::create_dir_all(output_dir).await?;
        let mut output = output_dir.join(input.file_stem().unwrap());
        output.set_extension("pdf");
        let mut pdf = b"%PDF-fake\n".to_vec();
        pdf.extend_from_slice(&content);
        tokio::fs::write(&output, pdf).await?;
        Ok(output)
    }
}

pub fn write_file(root: &Path, id: &str, content: &[u8]) {
    let path = root.join(id);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

pub fn quiet_config() -> converter_core::ProcessingConfig {
    converter_core::ProcessingConfig {
        batch_delay_secs: 0,
        progress_enabled: false,
        ..Default::default()
    }
}
