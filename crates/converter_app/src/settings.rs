use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use converter_core::ProcessingConfig;
use converter_engine::{AtomicFileWriter, EngineSettings, TransferSettings, DEFAULT_FAILURE_LOG};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTINGS_FILE: &str = "converter.ron";

/// Contents of `converter.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// SAS URL or directory watched for the trigger file.
    pub monitor_location: String,
    pub trigger_folder: String,
    pub trigger_name: String,
    pub source_folder: String,
    pub dest_prefix: String,
    pub polling_interval_secs: u64,
    pub converter_program: PathBuf,
    pub conversion_timeout_secs: u64,
    pub scratch_root: Option<PathBuf>,
    pub failure_log: PathBuf,
    pub log_file: PathBuf,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub processing: ProcessingConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            monitor_location: engine.monitor_location,
            trigger_folder: engine.trigger_folder,
            trigger_name: engine.trigger_name,
            source_folder: engine.source_folder,
            dest_prefix: engine.dest_prefix,
            polling_interval_secs: engine.polling_interval.as_secs(),
            converter_program: engine.converter_program,
            conversion_timeout_secs: engine.conversion_timeout.as_secs(),
            scratch_root: engine.scratch_root,
            failure_log: PathBuf::from(DEFAULT_FAILURE_LOG),
            log_file: PathBuf::from("doc_converter.log"),
            connect_timeout_secs: engine.transfer.connect_timeout.as_secs(),
            request_timeout_secs: engine.transfer.request_timeout.as_secs(),
            pool_max_idle_per_host: engine.transfer.pool_max_idle_per_host,
            processing: engine.processing,
        }
    }
}

impl AppSettings {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            processing: self.processing.clone(),
            transfer: TransferSettings {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                pool_max_idle_per_host: self.pool_max_idle_per_host,
            },
            monitor_location: self.monitor_location.clone(),
            trigger_folder: self.trigger_folder.clone(),
            trigger_name: self.trigger_name.clone(),
            source_folder: self.source_folder.clone(),
            dest_prefix: self.dest_prefix.clone(),
            polling_interval: Duration::from_secs(self.polling_interval_secs.max(1)),
            converter_program: self.converter_program.clone(),
            conversion_timeout: Duration::from_secs(self.conversion_timeout_secs),
            scratch_root: self.scratch_root.clone(),
            failure_log: self.failure_log.clone(),
        }
    }
}

/// Loads settings from `path`; a missing file yields the defaults.
pub fn load(path: &Path) -> anyhow::Result<AppSettings> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppSettings::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read settings from {path:?}"))
        }
    };
    ron::from_str(&content).with_context(|| format!("failed to parse settings in {path:?}"))
}

/// Writes `settings` to `path`, refusing to replace an existing file unless `force`.
pub fn save(path: &Path, settings: &AppSettings, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{path:?} already exists; pass --force to overwrite it");
    }
    let pretty = ron::ser::PrettyConfig::new();
    let content =
        ron::ser::to_string_pretty(settings, pretty).context("failed to serialize settings")?;
    AtomicFileWriter::new(path)
        .write(&content)
        .with_context(|| format!("failed to write settings to {path:?}"))
}
