//! Capturing logger for tests that assert on log output

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use std::sync::Mutex;

static RECORDS: Lazy<Mutex<Vec<(Level, String)>>> = Lazy::new(|| Mutex::new(Vec::new()));

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = RECORDS.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Install the capturing logger (idempotent)
pub fn init() {
    // Fails only when already installed, which is fine for the next test
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);
}

/// Messages logged at warn level or above that start with `prefix`
///
/// Tests run in parallel and share the logger, so each test uses a unique
/// worker name as prefix.
pub fn warnings_with_prefix(prefix: &str) -> Vec<String> {
    RECORDS
        .lock()
        .map(|records| {
            records
                .iter()
                .filter(|(level, message)| *level <= Level::Warn && message.starts_with(prefix))
                .map(|(_, message)| message.clone())
                .collect()
        })
        .unwrap_or_default()
}
