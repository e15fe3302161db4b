//! Durable record of failed items, stored as JSON Lines.
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use converter_core::{ErrorKind, KindTally, ProcessingOutcome};
use engine_logging::{engine_debug, engine_warn};
use serde::{Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};

pub const DEFAULT_FAILURE_LOG: &str = "failed_conversions.jsonl";

#[derive(Debug, thiserror::Error)]
pub enum FailureLogError {
    #[error("failure log io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode failure record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub item_id: String,
    pub error_kind: ErrorKind,
    pub error_message: String,
    pub size_bytes: u64,
    #[serde(default = "first_attempt")]
    pub attempt_count: u32,
}

fn first_attempt() -> u32 {
    1
}

impl FailureRecord {
    /// Builds the record for a failed outcome; successful outcomes yield `None`.
    pub fn from_outcome(outcome: &ProcessingOutcome, timestamp: DateTime<Utc>) -> Option<Self> {
        let kind = outcome.error_kind.filter(|_| !outcome.success)?;
        Some(Self {
            timestamp,
            item_id: outcome.item_id.clone(),
            error_kind: kind,
            error_message: outcome.error_message.clone().unwrap_or_default(),
            size_bytes: outcome.size_bytes,
            attempt_count: first_attempt(),
        })
    }
}

/// Append-only destination for failure records. Shared by all workers.
pub trait FailureSink: Send + Sync {
    fn append(&self, record: &FailureRecord) -> Result<(), FailureLogError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub error_kind: Option<ErrorKind>,
    /// Case-insensitive substring of the item id.
    pub name_contains: Option<String>,
}

impl FailureFilter {
    pub fn matches(&self, record: &FailureRecord) -> bool {
        if self.since.is_some_and(|since| record.timestamp < since) {
            return false;
        }
        if self.until.is_some_and(|until| record.timestamp > until) {
            return false;
        }
        if self.error_kind.is_some_and(|kind| record.error_kind != kind) {
            return false;
        }
        match &self.name_contains {
            Some(needle) => record
                .item_id
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSummary {
    pub total: usize,
    pub unique_items: usize,
    pub by_kind: KindTally,
    pub last_24_hours: usize,
}

/// JSON Lines failure log.
///
/// Writers serialise on an internal lock; every append is flushed before the
/// lock is released. Lines that no longer parse are skipped on read.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<Vec<FailureRecord>, FailureLogError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_unlocked()
    }

    pub fn query(&self, filter: &FailureFilter) -> Result<Vec<FailureRecord>, FailureLogError> {
        let mut records = self.read_all()?;
        records.retain(|record| filter.matches(record));
        Ok(records)
    }

    /// Drops records older than `older_than`, returning how many were removed.
    pub fn prune(&self, older_than: ChronoDuration) -> Result<usize, FailureLogError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let records = self.read_unlocked()?;
        let cutoff = Utc::now() - older_than;
        let before = records.len();
        let kept: Vec<_> = records
            .into_iter()
            .filter(|record| record.timestamp >= cutoff)
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            AtomicFileWriter::new(&self.path).write(&encode_lines(&kept)?)?;
        }
        engine_debug!("Pruned {removed} failure records older than {cutoff}");
        Ok(removed)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> Result<FailureSummary, FailureLogError> {
        let records = self.read_all()?;
        let day_ago = now - ChronoDuration::hours(24);
        let mut summary = FailureSummary {
            total: records.len(),
            ..FailureSummary::default()
        };
        let mut unique = std::collections::HashSet::new();
        for record in &records {
            summary.by_kind.record(record.error_kind);
            if record.timestamp >= day_ago {
                summary.last_24_hours += 1;
            }
            unique.insert(record.item_id.as_str());
        }
        summary.unique_items = unique.len();
        Ok(summary)
    }

    /// Writes the matching records to `output` as a new JSON Lines file.
    pub fn export(&self, filter: &FailureFilter, output: &Path) -> Result<usize, FailureLogError> {
        let records = self.query(filter)?;
        AtomicFileWriter::new(output).write(&encode_lines(&records)?)?;
        Ok(records.len())
    }

    fn read_unlocked(&self) -> Result<Vec<FailureRecord>, FailureLogError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => engine_warn!(
                    "Skipping malformed line {} in {}: {e}",
                    index + 1,
                    self.path.display()
                ),
            }
        }
        Ok(records)
    }

    fn io_error(&self, source: io::Error) -> FailureLogError {
        FailureLogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FailureSink for FailureLog {
    fn append(&self, record: &FailureRecord) -> Result<(), FailureLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| self.io_error(source))
    }
}

fn encode_lines(records: &[FailureRecord]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}
