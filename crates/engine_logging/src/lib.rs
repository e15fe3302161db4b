#![deny(missing_docs)]
//! Shared logging utilities for the converter workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! a scoped [`QuietRegion`] with the [`QuietGate`] terminal wrapper, and a minimal test
//! initializer for the global logger.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};
use simplelog::SharedLogger;

#[doc(hidden)]
pub use log;

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        $crate::log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        $crate::log::error!($($arg)*);
    }};
}

/// Number of live quiet regions.
static QUIET_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Scoped suppression of terminal log output below `Error`.
///
/// While at least one region is alive, loggers wrapped in [`QuietGate`] drop
/// records below `Error`. Other loggers (the log file) keep everything.
/// Regions nest and may be held from several threads at once. The region ends
/// in `Drop`, so it also ends when the guarded code returns early or unwinds.
#[must_use = "the quiet region ends as soon as the guard is dropped"]
pub struct QuietRegion {
    _private: (),
}

impl QuietRegion {
    /// Enters a quiet region.
    pub fn enter() -> Self {
        QUIET_DEPTH.fetch_add(1, Ordering::SeqCst);
        Self { _private: () }
    }
}

impl Drop for QuietRegion {
    fn drop(&mut self) {
        QUIET_DEPTH.fetch_sub(1, Ordering::SeqCst);
    }
}

/// True while any [`QuietRegion`] is alive.
pub fn is_quiet() -> bool {
    QUIET_DEPTH.load(Ordering::SeqCst) > 0
}

/// Wraps a logger so that it goes silent below `Error` inside a [`QuietRegion`].
pub struct QuietGate {
    inner: Box<dyn SharedLogger>,
}

impl QuietGate {
    /// Gates `inner`, typically the terminal logger.
    pub fn new(inner: Box<dyn SharedLogger>) -> Box<Self> {
        Box::new(Self { inner })
    }
}

impl Log for QuietGate {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        (metadata.level() <= Level::Error || !is_quiet()) && self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

impl SharedLogger for QuietGate {
    fn level(&self) -> LevelFilter {
        self.inner.level()
    }

    fn config(&self) -> Option<&simplelog::Config> {
        self.inner.config()
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        self
    }
}

/// Runs `f` inside a [`QuietRegion`].
pub fn quietly<T>(f: impl FnOnce() -> T) -> T {
    let _quiet = QuietRegion::enter();
    f()
}

/// Flushes buffered output of the global logger.
pub fn flush() {
    log::logger().flush();
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![QuietGate::new(TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ))]);
}
