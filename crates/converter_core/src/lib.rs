//! Converter core: pure domain types, batch planning and job arithmetic.
mod batch;
mod config;
mod estimate;
mod item;
mod outcome;
mod stage;
mod stats;

pub use batch::{batch_count, plan_batches, Batch};
pub use config::{ConfigError, ConfigReview, ProcessingConfig};
pub use estimate::{JobEstimate, MEMORY_PER_BATCH_MB, SINGLE_WORKER_SECONDS_PER_ITEM};
pub use item::{destination_name, ItemCategory, WorkItem, CONVERTED_FOLDER};
pub use outcome::{ErrorKind, ParseErrorKindError, ProcessingOutcome, WorkerId};
pub use stage::{InvalidTransition, ItemStage};
pub use stats::{BatchStats, JobStats, KindTally};
