//! Logging sink for the preload sandbox.
//!
//! The crate logs through the `log` facade. In the preload build the sink
//! must stay usable after restriction, where only read/write/exit/sigreturn
//! survive: each line is formatted in memory — allocation comes from the
//! crate's own syscall-free heap — and written to fd 2 with a single
//! `write`. `env_logger`'s terminal probing and timestamp formatting do
//! not fit inside that window.

use log::{LevelFilter, Log, Metadata, Record};

/// Level selector read from the environment: `debug`, `info`, or `off`;
/// anything else means `warn`.
pub const LOG_LEVEL_ENV: &str = "STRICTBOX_LOG";

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("strictbox[{}] {}\n", record.level(), record.args());
        // SAFETY: plain write(2) on fd 2 from an owned buffer.
        unsafe {
            libc::write(libc::STDERR_FILENO, line.as_ptr().cast(), line.len());
        }
    }

    fn flush(&self) {}
}

fn level_from_env() -> LevelFilter {
    match std::env::var(LOG_LEVEL_ENV).ok().as_deref() {
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

/// Install the fd-2 sink. Called once from the preload entry; a logger
/// installed earlier by an embedding program wins.
pub fn install() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_from_env());
    }
}
