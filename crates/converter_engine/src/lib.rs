//! Converter engine: storage adapters, the item pipeline and the batch-processing core.
mod aggregator;
mod convert;
mod decode;
mod engine;
mod error;
mod failure_log;
mod filename;
mod orchestrator;
mod persist;
mod pool;
mod processor;
mod progress;
mod storage;
mod trigger;

pub use aggregator::{ResultAggregator, RunTally};
pub use convert::{CommandConverter, ConversionError, ConversionService};
pub use decode::{decode_text, DecodeError};
pub use engine::{ConversionEngine, EngineSettings, JobRequest};
pub use error::{JobAborted, JobError};
pub use failure_log::{
    FailureFilter, FailureLog, FailureLogError, FailureRecord, FailureSink, FailureSummary,
    DEFAULT_FAILURE_LOG,
};
pub use filename::scratch_file_name;
pub use orchestrator::BatchOrchestrator;
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use pool::{ItemHandler, PoolReport, WorkerPool};
pub use processor::ItemProcessor;
pub use progress::{NoopProgress, ProgressSink, TerminalProgress};
pub use storage::{
    open_store, ListedObject, LocalDirStore, RemoteStore, SasBlobStore, SasLocation,
    StorageError, StorageLister, StorageTransfer, TransferSettings,
};
pub use trigger::{parse_trigger, TriggerError, TriggerSpec};
