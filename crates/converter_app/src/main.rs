mod cli;
mod logging;
mod report;
mod settings;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use converter_core::JobEstimate;
use converter_engine::{ConversionEngine, FailureFilter, FailureLog, JobRequest};
use engine_logging::{engine_error, engine_info};
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command, FailuresCommand, FilterArgs};
use settings::AppSettings;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            engine_error!("{err:#}");
            engine_logging::flush();
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = settings::load(&cli.config)?;
    cli.apply_overrides(&mut settings);
    logging::initialize(&settings.log_file, cli.verbose);

    let mut stdout = io::stdout();
    match cli.command {
        Command::Watch(_) => watch(&settings),
        Command::Run(args) => {
            let request = JobRequest {
                source: args.source,
                destination: args.dest,
            };
            let clean = run_once(&settings, request, &mut stdout)?;
            // Exit code 2 tells scripts that some documents failed.
            Ok(if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Command::Failures { action } => {
            failures(&FailureLog::new(&settings.failure_log), action, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Estimate { items } => {
            let estimate = JobEstimate::for_job(&settings.processing, items);
            report::write_estimate(&mut stdout, items, &estimate)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckConfig => {
            if let Err(err) = settings.processing.validate() {
                writeln!(stdout, "Invalid configuration: {err}")?;
                return Ok(ExitCode::FAILURE);
            }
            report::write_review(&mut stdout, &settings.processing.review())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig { force } => {
            settings::save(&cli.config, &settings, force)?;
            writeln!(stdout, "Wrote {}", cli.config.display())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("doc-converter")
        .build()
        .context("failed to start the async runtime")
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_interrupt(runtime: &tokio::runtime::Runtime, token: CancellationToken) {
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_info!("Interrupt received; finishing the current batch");
            token.cancel();
        }
    });
}

fn watch(settings: &AppSettings) -> anyhow::Result<ExitCode> {
    if settings.monitor_location.trim().is_empty() {
        anyhow::bail!("no monitor_location configured; set it in the settings file or pass --monitor");
    }
    let runtime = build_runtime()?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(&runtime, cancel.clone());

    let engine = ConversionEngine::new(settings.engine_settings());
    runtime
        .block_on(engine.watch(cancel))
        .context("watcher stopped")?;
    Ok(ExitCode::SUCCESS)
}

/// Runs one job and prints its summary. Returns whether every item succeeded.
fn run_once(
    settings: &AppSettings,
    request: JobRequest,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let runtime = build_runtime()?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(&runtime, cancel.clone());

    let engine = ConversionEngine::new(settings.engine_settings());
    match runtime.block_on(engine.run_job(&request, cancel)) {
        Ok(stats) => {
            report::write_job_stats(out, &stats)?;
            Ok(stats.failures == 0)
        }
        Err(aborted) => {
            engine_error!("{aborted}");
            report::write_job_stats(out, &aborted.partial)?;
            Err(aborted.source).context("job aborted")
        }
    }
}

fn failures(log: &FailureLog, action: FailuresCommand, out: &mut impl Write) -> anyhow::Result<()> {
    match action {
        FailuresCommand::Summary => {
            let summary = log.summary(Utc::now())?;
            report::write_failure_summary(out, &summary)?;
        }
        FailuresCommand::List(filter) => {
            let records = log.query(&to_filter(filter))?;
            report::write_failure_records(out, &records)?;
        }
        FailuresCommand::Export { output, filter } => {
            let written = log.export(&to_filter(filter), &output)?;
            writeln!(out, "Exported {written} record(s) to {}", output.display())?;
        }
        FailuresCommand::Prune { days } => {
            let removed = log.prune(ChronoDuration::days(days))?;
            writeln!(out, "Removed {removed} record(s) older than {days} days")?;
        }
    }
    Ok(())
}

fn to_filter(args: FilterArgs) -> FailureFilter {
    FailureFilter {
        since: args.hours.map(|hours| Utc::now() - ChronoDuration::hours(hours)),
        until: None,
        error_kind: args.kind,
        name_contains: args.name,
    }
}
