use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use converter_core::ErrorKind;

use crate::settings::{AppSettings, DEFAULT_SETTINGS_FILE};

#[derive(Debug, Parser)]
#[command(name = "doc-converter")]
#[command(about = "Convert documents in blob storage to PDF in throttled batches")]
#[command(version)]
pub struct Cli {
    /// Settings file (RON). Missing file means built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    pub config: PathBuf,

    /// Maximum concurrent workers
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Items per batch
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Seconds to wait between batches
    #[arg(long, global = true)]
    pub batch_delay: Option<u64>,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll for the trigger file and run jobs until interrupted
    Watch(WatchArgs),
    /// Run one conversion job now
    Run(RunArgs),
    /// Inspect or maintain the failure log
    Failures {
        #[command(subcommand)]
        action: FailuresCommand,
    },
    /// Project batches, duration and memory for a job size
    Estimate {
        /// Number of documents
        #[arg(long)]
        items: usize,
    },
    /// Validate the configuration and print recommendations
    CheckConfig,
    /// Write a settings file with the current values
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Location to watch instead of `monitor_location` from the settings file
    #[arg(long)]
    pub monitor: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Source SAS URL or directory
    #[arg(long)]
    pub source: String,

    /// Destination SAS URL or directory
    #[arg(long)]
    pub dest: String,
}

#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    /// Only failures from the last N hours
    #[arg(long)]
    pub hours: Option<i64>,

    /// Only this error kind (e.g. conversion-failed)
    #[arg(long)]
    pub kind: Option<ErrorKind>,

    /// Only items whose id contains this text
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum FailuresCommand {
    /// Totals by error kind
    Summary,
    /// Print matching failure records
    List(FilterArgs),
    /// Write matching records to a new JSON Lines file
    Export {
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Remove records older than N days
    Prune {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

impl Cli {
    /// Applies command-line overrides on top of the settings file.
    pub fn apply_overrides(&self, settings: &mut AppSettings) {
        if let Some(workers) = self.workers {
            settings.processing.max_workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            settings.processing.batch_size = batch_size;
        }
        if let Some(delay) = self.batch_delay {
            settings.processing.batch_delay_secs = delay;
        }
        if self.no_progress {
            settings.processing.progress_enabled = false;
        }
        if let Command::Watch(WatchArgs {
            monitor: Some(monitor),
        }) = &self.command
        {
            settings.monitor_location = monitor.clone();
        }
    }
}
