use std::sync::{Arc, Mutex};

use engine_logging::{is_quiet, quietly, QuietGate, QuietRegion};
use log::{Level, LevelFilter, Log, Metadata, Record};
use simplelog::SharedLogger;

/// Logger that keeps every message it accepts.
#[derive(Clone, Default)]
struct Capture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Capture {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.lines.lock().unwrap().push(record.args().to_string());
    }

    fn flush(&self) {}
}

impl SharedLogger for Capture {
    fn level(&self) -> LevelFilter {
        LevelFilter::Trace
    }

    fn config(&self) -> Option<&simplelog::Config> {
        None
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        self
    }
}

fn emit(logger: &dyn Log, level: Level, message: &str) {
    logger.log(
        &Record::builder()
            .level(level)
            .target("converter")
            .args(format_args!("{message}"))
            .build(),
    );
}

// Single test: the quiet depth is process-global state.
#[test]
fn quiet_region_silences_only_the_gated_logger() {
    let terminal = Capture::default();
    let file = Capture::default();
    let gate = QuietGate::new(Box::new(terminal.clone()));
    log::set_max_level(LevelFilter::Debug);

    emit(gate.as_ref(), Level::Warn, "before");
    {
        let _outer = QuietRegion::enter();
        {
            let _inner = QuietRegion::enter();
            emit(gate.as_ref(), Level::Warn, "nested warn");
        }
        // Still inside the outer region.
        assert!(is_quiet());
        emit(gate.as_ref(), Level::Warn, "doc.docx failed (DOWNLOAD_FAILED)");
        emit(&file, Level::Warn, "doc.docx failed (DOWNLOAD_FAILED)");
        emit(gate.as_ref(), Level::Error, "worker task failed");
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
    assert!(!is_quiet());
    emit(gate.as_ref(), Level::Info, "after");

    assert_eq!(terminal.lines(), vec!["before", "worker task failed", "after"]);
    assert_eq!(file.lines(), vec!["doc.docx failed (DOWNLOAD_FAILED)"]);

    assert!(quietly(is_quiet));
    assert!(!is_quiet());

    let unwound = std::panic::catch_unwind(|| {
        let _quiet = QuietRegion::enter();
        panic!("redraw failed");
    });
    assert!(unwound.is_err());
    assert!(!is_quiet());
}
