use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use converter_core::{JobStats, ProcessingConfig, ProcessingOutcome, WorkItem, WorkerId};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::convert::{CommandConverter, ConversionService};
use crate::error::{JobAborted, JobError};
use crate::failure_log::{FailureLog, DEFAULT_FAILURE_LOG};
use crate::orchestrator::BatchOrchestrator;
use crate::pool::ItemHandler;
use crate::processor::ItemProcessor;
use crate::storage::{open_store, ListedObject, RemoteStore, TransferSettings};
use crate::trigger::{parse_trigger, TriggerSpec};

/// Locations, folders and tunables of the polling engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub processing: ProcessingConfig,
    pub transfer: TransferSettings,
    /// Store watched for the trigger file (SAS URL or local directory).
    pub monitor_location: String,
    pub trigger_folder: String,
    pub trigger_name: String,
    /// Folder of the source store holding the documents to convert.
    pub source_folder: String,
    /// Prefix under which `converted/` is created in the destination store.
    pub dest_prefix: String,
    pub polling_interval: Duration,
    pub converter_program: PathBuf,
    pub conversion_timeout: Duration,
    /// Parent of the per-worker scratch directories; system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
    pub failure_log: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            transfer: TransferSettings::default(),
            monitor_location: String::new(),
            trigger_folder: "config".to_string(),
            trigger_name: "start_conversion_1234.txt".to_string(),
            source_folder: "files".to_string(),
            dest_prefix: String::new(),
            polling_interval: Duration::from_secs(120),
            converter_program: PathBuf::from("soffice"),
            conversion_timeout: Duration::from_secs(120),
            scratch_root: None,
            failure_log: PathBuf::from(DEFAULT_FAILURE_LOG),
        }
    }
}

impl EngineSettings {
    pub fn trigger_id(&self) -> String {
        join_id(&self.trigger_folder, &self.trigger_name)
    }
}

/// Source and destination of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub source: String,
    pub destination: String,
}

impl From<TriggerSpec> for JobRequest {
    fn from(spec: TriggerSpec) -> Self {
        Self {
            source: spec.source,
            destination: spec.destination,
        }
    }
}

type ConverterFactory = dyn Fn(WorkerId) -> Box<dyn ConversionService> + Send + Sync;

/// Watches for trigger files and runs conversion jobs.
///
/// Items that converted successfully are remembered for the lifetime of the
/// engine and skipped by later jobs.
pub struct ConversionEngine {
    settings: EngineSettings,
    failures: Arc<FailureLog>,
    converters: Arc<ConverterFactory>,
    completed: Arc<Mutex<HashSet<String>>>,
}

impl ConversionEngine {
    pub fn new(settings: EngineSettings) -> Self {
        let program = settings.converter_program.clone();
        let timeout = settings.conversion_timeout;
        let profiles = settings
            .scratch_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let converters: Arc<ConverterFactory> = Arc::new(move |worker_id: WorkerId| {
            let profile = profiles.join(format!("doc-converter-profile-{worker_id}"));
            Box::new(CommandConverter::new(program.clone(), timeout).with_profile_dir(profile))
                as Box<dyn ConversionService>
        });
        Self {
            failures: Arc::new(FailureLog::new(settings.failure_log.clone())),
            settings,
            converters,
            completed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replaces the office converter, e.g. with an in-process one.
    pub fn with_converters<F, C>(mut self, make: F) -> Self
    where
        F: Fn(WorkerId) -> C + Send + Sync + 'static,
        C: ConversionService + 'static,
    {
        self.converters = Arc::new(move |worker_id: WorkerId| {
            Box::new(make(worker_id)) as Box<dyn ConversionService>
        });
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn failure_log(&self) -> &Arc<FailureLog> {
        &self.failures
    }

    /// Polls the monitor store until `cancel` fires. Job errors are logged and
    /// polling continues.
    pub async fn watch(&self, cancel: CancellationToken) -> Result<(), JobError> {
        let monitor = open_store(&self.settings.monitor_location, &self.settings.transfer)?;
        engine_info!(
            "Watching {} for {} every {:?}",
            monitor.describe(),
            self.settings.trigger_id(),
            self.settings.polling_interval
        );
        loop {
            match self.poll_once(monitor.as_ref(), &cancel).await {
                Ok(Some(_)) => {}
                Ok(None) => engine_debug!("No trigger file found"),
                Err(e) => engine_error!("Polling cycle failed: {e}"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.polling_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
        engine_info!("Stopped watching");
        Ok(())
    }

    /// One polling cycle: run a job if the trigger file is present, then delete it.
    ///
    /// The trigger is kept when the job aborts, so the next cycle retries.
    pub async fn poll_once(
        &self,
        monitor: &dyn RemoteStore,
        cancel: &CancellationToken,
    ) -> Result<Option<JobStats>, JobError> {
        let trigger_id = self.settings.trigger_id();
        let folder = format!("{}/", self.settings.trigger_folder.trim_matches('/'));
        let present = monitor
            .list(&folder)
            .await
            .map_err(|source| JobError::Listing {
                prefix: folder.clone(),
                source,
            })?
            .iter()
            .any(|object| object.id == trigger_id);
        if !present {
            return Ok(None);
        }
        engine_info!("Found trigger file {trigger_id}");

        let spec = self.read_trigger(monitor, &trigger_id).await?;
        let request = JobRequest::from(spec);
        match self.run_job(&request, cancel.clone()).await {
            Ok(stats) => {
                monitor.delete(&trigger_id).await?;
                engine_info!("Deleted trigger file {trigger_id}");
                Ok(Some(stats))
            }
            Err(aborted) => {
                engine_warn!(
                    "Keeping trigger file; {} of {} items were processed",
                    aborted.partial.processed(),
                    aborted.partial.total_items
                );
                Err(aborted.source)
            }
        }
    }

    /// Runs one job from `request.source` to `request.destination`.
    pub async fn run_job(
        &self,
        request: &JobRequest,
        cancel: CancellationToken,
    ) -> Result<JobStats, JobAborted> {
        let source = open_store(&request.source, &self.settings.transfer).map_err(not_started)?;
        let destination =
            open_store(&request.destination, &self.settings.transfer).map_err(not_started)?;
        engine_info!(
            "Converting from {} to {}",
            source.describe(),
            destination.describe()
        );

        let prefix = format!("{}/", self.settings.source_folder.trim_matches('/'));
        let listed = source.list(&prefix).await.map_err(|e| JobAborted {
            source: JobError::Listing {
                prefix: prefix.clone(),
                source: e,
            },
            partial: JobStats::default(),
        })?;
        let items = self.select_items(listed);

        let orchestrator =
            BatchOrchestrator::new(self.settings.processing.clone(), self.failures.clone())
                .with_cancellation(cancel);
        let review = orchestrator.review();
        for recommendation in &review.recommendations {
            engine_warn!("Configuration: {recommendation}");
        }
        let estimate = orchestrator.estimate(items.len());
        engine_info!(
            "Estimated {:.2} hours over {} batch(es)",
            estimate.estimated_hours(),
            estimate.estimated_batches
        );

        let scratch_root = self.settings.scratch_root.clone();
        let make_handler = |worker_id: WorkerId| -> Result<_, JobError> {
            let processor = ItemProcessor::new(
                worker_id,
                Arc::clone(&source),
                Arc::clone(&destination),
                self.settings.dest_prefix.clone(),
                (self.converters)(worker_id),
                scratch_root.as_deref(),
            )?;
            Ok(CompletionTracker {
                inner: processor,
                completed: Arc::clone(&self.completed),
            })
        };
        let stats = orchestrator.run(items, make_handler).await?;
        self.log_failure_summary();
        Ok(stats)
    }

    /// Supported items not yet converted by this engine, in listing order.
    fn select_items(&self, listed: Vec<ListedObject>) -> Vec<WorkItem> {
        let completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = Vec::with_capacity(listed.len());
        for object in listed {
            if completed.contains(&object.id) {
                engine_debug!("Skipping already converted {}", object.id);
                continue;
            }
            match WorkItem::classify(object.id.as_str()) {
                Some(item) => items.push(item.with_size(object.size_bytes.unwrap_or(0))),
                None => engine_debug!("Skipping unsupported {}", object.id),
            }
        }
        engine_info!("Found {} document(s) to convert", items.len());
        items
    }

    async fn read_trigger(
        &self,
        monitor: &dyn RemoteStore,
        trigger_id: &str,
    ) -> Result<TriggerSpec, JobError> {
        let scratch = tempfile::tempdir().map_err(crate::storage::StorageError::from)?;
        let local = scratch.path().join("trigger.txt");
        monitor.download(trigger_id, &local).await?;
        let bytes = tokio::fs::read(&local)
            .await
            .map_err(crate::storage::StorageError::from)?;
        Ok(parse_trigger(&bytes)?)
    }

    fn log_failure_summary(&self) {
        match self.failures.summary(Utc::now()) {
            Ok(summary) if summary.total > 0 => {
                engine_info!(
                    "Failure log {}: {} record(s), {} unique item(s), {} in the last 24 hours",
                    self.failures.path().display(),
                    summary.total,
                    summary.unique_items,
                    summary.last_24_hours
                );
                for (kind, count) in summary.by_kind.iter() {
                    engine_info!("  {kind}: {count}");
                }
            }
            Ok(_) => {}
            Err(e) => engine_warn!("Could not summarise failure log: {e}"),
        }
    }
}

/// Remembers successfully converted ids across jobs.
struct CompletionTracker<H> {
    inner: H,
    completed: Arc<Mutex<HashSet<String>>>,
}

#[async_trait::async_trait]
impl<H: ItemHandler> ItemHandler for CompletionTracker<H> {
    async fn handle(&mut self, item: &WorkItem) -> ProcessingOutcome {
        let outcome = self.inner.handle(item).await;
        if outcome.success {
            self.completed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(item.id.clone());
        }
        outcome
    }
}

fn not_started(e: crate::storage::StorageError) -> JobAborted {
    JobAborted {
        source: e.into(),
        partial: JobStats::default(),
    }
}

fn join_id(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}
