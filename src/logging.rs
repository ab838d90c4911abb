//! Stderr logger behind the `log` facade.
//!
//! Lines look like `[14:03:27.512] [INFO] [Saver] Periodic save #3`. The
//! bracketed component prefix is part of each message.

use std::io::Write;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<StderrLogger> = OnceCell::new();

#[derive(Debug)]
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub fn new(level: LevelFilter) -> Self {
        StderrLogger { level }
    }

    pub fn format_line(record: &Record) -> String {
        format!(
            "[{}] [{}] {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = Self::format_line(record);
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Parse a level name, falling back to `Info` for anything unknown.
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Install the stderr logger. `RUST_LOG`, when set, overrides `level`.
///
/// Only the first call installs a logger; later calls return an error from
/// the `log` crate and leave the first logger in place.
pub fn init_logging(level: &str) -> Result<(), SetLoggerError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(env_level) if !env_level.trim().is_empty() => parse_level(&env_level),
        _ => parse_level(level),
    };

    let logger = LOGGER.get_or_init(|| StderrLogger::new(filter));
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}
