use std::env;
use std::fs::{File, OpenOptions};
use std::io::{stderr, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

/// Environment variable controlling the log level, e.g. `debug` or `trace`.
pub const LOG_LEVEL_ENV: &str = "PODUP_LOG_LEVEL";

static PODUP_LOGGER: OnceCell<PodupLogger> = OnceCell::new();
static LOG_FILE: OnceCell<Option<File>> = OnceCell::new();

/// Installs the process wide logger. Records go to `log_file` when given,
/// to stderr otherwise.
pub fn init(log_file: Option<PathBuf>) -> Result<()> {
    let level_filter = match env::var(LOG_LEVEL_ENV) {
        Ok(level) => LevelFilter::from_str(&level).unwrap_or(LevelFilter::Warn),
        Err(_) => LevelFilter::Warn,
    };

    LOG_FILE.get_or_try_init(|| -> Result<Option<File>> {
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("failed to open log file {:?}", path))?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    })?;

    let logger = PODUP_LOGGER.get_or_init(|| PodupLogger {
        level: level_filter.to_level(),
    });
    log::set_logger(logger)
        .map(|()| log::set_max_level(level_filter))
        .context("failed to install logger")?;
    Ok(())
}

struct PodupLogger {
    level: Option<log::Level>,
}

impl Log for PodupLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if let Some(level) = self.level {
            metadata.level() <= level
        } else {
            false
        }
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_msg = match (record.file(), record.line()) {
                (Some(file), Some(line)) => format!(
                    "[{} {}:{}] {} {}",
                    record.level(),
                    file,
                    line,
                    chrono::Local::now().to_rfc3339(),
                    record.args()
                ),
                (_, _) => format!(
                    "[{}] {} {}",
                    record.level(),
                    chrono::Local::now().to_rfc3339(),
                    record.args()
                ),
            };
            match LOG_FILE.get().and_then(Option::as_ref) {
                Some(mut log_file) => {
                    let _ = writeln!(log_file, "{}", log_msg);
                }
                None => {
                    let _ = writeln!(stderr(), "{}", log_msg);
                }
            }
        }
    }

    fn flush(&self) {
        match LOG_FILE.get().and_then(Option::as_ref) {
            Some(mut log_file) => {
                let _ = log_file.flush();
            }
            None => {
                let _ = stderr().flush();
            }
        }
    }
}
