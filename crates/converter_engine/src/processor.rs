use std::path::{Path, PathBuf};
use std::sync::Arc;

use converter_core::{
    destination_name, ErrorKind, ItemCategory, ItemStage, ProcessingOutcome, WorkItem, WorkerId,
};
use engine_logging::{engine_debug, engine_trace, engine_warn};
use tempfile::TempDir;

use crate::convert::ConversionService;
use crate::error::JobError;
use crate::filename::scratch_file_name;
use crate::pool::ItemHandler;
use crate::storage::RemoteStore;

/// Fetch, transform or pass through, publish, clean up. One per worker.
///
/// The scratch directory and converter belong to this processor for its whole
/// lifetime; the scratch directory is removed when the processor is dropped.
pub struct ItemProcessor<C> {
    worker_id: WorkerId,
    source: Arc<dyn RemoteStore>,
    destination: Arc<dyn RemoteStore>,
    dest_prefix: String,
    converter: C,
    scratch: TempDir,
}

/// A failure inside one stage, before it becomes an outcome.
struct StageFailure {
    kind: ErrorKind,
    message: String,
}

impl StageFailure {
    fn new(kind: ErrorKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

/// Files created while processing one item; removed on drop, whatever the outcome.
#[derive(Default)]
struct ScratchFiles(Vec<PathBuf>);

impl ScratchFiles {
    fn track(&mut self, path: &Path) {
        if !self.0.iter().any(|p| p == path) {
            self.0.push(path.to_path_buf());
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => engine_trace!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => engine_warn!("Could not remove {}: {e}", path.display()),
            }
        }
    }
}

impl<C: ConversionService + 'static> ItemProcessor<C> {
    /// Creates a processor with a fresh scratch directory under `scratch_root`
    /// (the system temp directory when `None`).
    pub fn new(
        worker_id: WorkerId,
        source: Arc<dyn RemoteStore>,
        destination: Arc<dyn RemoteStore>,
        dest_prefix: impl Into<String>,
        converter: C,
        scratch_root: Option<&Path>,
    ) -> Result<Self, JobError> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("worker-{worker_id}-");
        builder.prefix(&prefix);
        let scratch = match scratch_root {
            Some(root) => std::fs::create_dir_all(root).and_then(|()| builder.tempdir_in(root)),
            None => builder.tempdir(),
        }
        .map_err(|e| JobError::WorkerSetup {
            worker_id,
            message: format!("scratch directory: {e}"),
        })?;
        engine_debug!("Worker {worker_id} scratch at {}", scratch.path().display());
        Ok(Self {
            worker_id,
            source,
            destination,
            dest_prefix: dest_prefix.into(),
            converter,
            scratch,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    async fn run_stages(
        &mut self,
        item: &WorkItem,
        stage: &mut ItemStage,
        size: &mut u64,
        files: &mut ScratchFiles,
    ) -> Result<(), StageFailure> {
        let local = self.scratch.path().join(scratch_file_name(&item.id));
        let out_dir = self.scratch.path().join("out");

        step(stage, ItemStage::Downloading)?;
        files.track(&local);
        *size = self
            .source
            .download(&item.id, &local)
            .await
            .map_err(|e| StageFailure::new(ErrorKind::DownloadFailed, e))?;

        let produced = match item.category {
            ItemCategory::CopyAsIs => {
                step(stage, ItemStage::Copying)?;
                self.converter
                    .pass_through(&local)
                    .await
                    .map_err(|e| StageFailure::new(ErrorKind::CopyFailed, e))?
            }
            ItemCategory::Convert => {
                step(stage, ItemStage::Converting)?;
                let produced = self
                    .converter
                    .transform(&local, &out_dir)
                    .await
                    .map_err(|e| StageFailure::new(ErrorKind::ConversionFailed, e))?;
                files.track(&produced);
                produced
            }
        };

        step(stage, ItemStage::Uploading)?;
        let dest_id = destination_name(item, &self.dest_prefix);
        self.destination
            .upload(&produced, &dest_id)
            .await
            .map_err(|e| StageFailure::new(ErrorKind::UploadFailed, e))?;
        engine_debug!("Published {} as {dest_id}", item.id);
        step(stage, ItemStage::Succeeded)
    }
}

fn step(stage: &mut ItemStage, next: ItemStage) -> Result<(), StageFailure> {
    *stage = stage
        .advance(next)
        .map_err(|e| StageFailure::new(ErrorKind::ProcessingError, e))?;
    Ok(())
}

#[async_trait::async_trait]
impl<C: ConversionService + 'static> ItemHandler for ItemProcessor<C> {
    async fn handle(&mut self, item: &WorkItem) -> ProcessingOutcome {
        let mut stage = ItemStage::Pending;
        let mut size = item.size_bytes;
        let result = {
            let mut files = ScratchFiles::default();
            self.run_stages(item, &mut stage, &mut size, &mut files).await
        };

        let outcome = match result {
            Ok(()) => ProcessingOutcome::succeeded(item.id.clone(), size, self.worker_id),
            Err(failure) => {
                stage = stage
                    .advance(ItemStage::Failed(failure.kind))
                    .unwrap_or(ItemStage::Failed(failure.kind));
                ProcessingOutcome::failed(
                    item.id.clone(),
                    failure.kind,
                    failure.message,
                    size,
                    self.worker_id,
                )
            }
        };
        if let Ok(done) = stage.advance(ItemStage::CleanedUp) {
            stage = done;
        }
        engine_trace!("{} finished in stage {stage}", item.id);
        outcome
    }
}
