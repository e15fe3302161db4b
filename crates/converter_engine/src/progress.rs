use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use engine_logging::QuietRegion;

/// Receives progress updates from every worker of a run. Calls may race.
pub trait ProgressSink: Send + Sync {
    fn advance(&self, n: u64);
    fn set_label(&self, label: &str);
    fn close(&self);
}

/// Progress sink used when progress display is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn advance(&self, _n: u64) {}
    fn set_label(&self, _label: &str) {}
    fn close(&self) {}
}

const BAR_WIDTH: usize = 30;
const LABEL_WIDTH: usize = 32;
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct BarState {
    done: u64,
    label: String,
    closed: bool,
    last_draw: Option<Instant>,
}

/// Single-line progress bar on stderr.
#[derive(Debug)]
pub struct TerminalProgress {
    total: u64,
    state: Mutex<BarState>,
}

impl TerminalProgress {
    pub fn new(total: u64, label: impl Into<String>) -> Self {
        Self {
            total,
            state: Mutex::new(BarState {
                done: 0,
                label: label.into(),
                closed: false,
                last_draw: None,
            }),
        }
    }

    pub fn position(&self) -> u64 {
        self.lock().done
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn draw(&self, state: &mut BarState, force: bool) {
        let now = Instant::now();
        if !force
            && state
                .last_draw
                .is_some_and(|last| now.duration_since(last) < REDRAW_INTERVAL)
        {
            return;
        }
        state.last_draw = Some(now);
        let line = render_line(&state.label, state.done, self.total);
        let _quiet = QuietRegion::enter();
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{line}");
        let _ = stderr.flush();
    }
}

impl ProgressSink for TerminalProgress {
    fn advance(&self, n: u64) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.done = state.done.saturating_add(n).min(self.total);
        let finished = state.done == self.total;
        self.draw(&mut state, finished);
    }

    fn set_label(&self, label: &str) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.label = label.to_string();
        self.draw(&mut state, false);
    }

    fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        self.draw(&mut state, true);
        state.closed = true;
        let _ = writeln!(std::io::stderr());
    }
}

fn render_line(label: &str, done: u64, total: u64) -> String {
    let ratio = if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    };
    let filled = ((ratio * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let label: String = if label.chars().count() > LABEL_WIDTH {
        label
            .chars()
            .take(LABEL_WIDTH - 1)
            .chain(std::iter::once('…'))
            .collect()
    } else {
        label.to_string()
    };
    format!(
        "{label:<width$} [{}{}] {done}/{total} ({:>3.0}%)",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        ratio * 100.0,
        width = LABEL_WIDTH,
    )
}
