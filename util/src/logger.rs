//! Logging setup
//!
//! Records go to two places:
//! - stdout, which on the vehicle is the diagnostic serial channel. At
//!   115200 baud it can't keep up with per-cycle records, so it normally
//!   runs at a coarser level than the file.
//! - the session's log file, uncoloured.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::cmp::max;
use std::fmt;

use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Minimum levels of each log destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LogLevels {
    /// Diagnostic channel (stdout).
    pub console: LevelFilter,

    /// Session log file. Must let at least `Info` through.
    pub file: LevelFilter,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The log file must record at least `INFO`, found `{0}`")]
    InvalidFileLevel(LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            console: LevelFilter::Info,
            file: LevelFilter::Debug,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// # Safety
///
/// - This function must only be called once, a second logger can't be set.
pub fn logger_init(levels: LogLevels, session: &Session) -> Result<(), LoggerInitError> {

    if levels.file < Level::Info {
        return Err(LoggerInitError::InvalidFileLevel(levels.file))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let console = fern::Dispatch::new()
        .level(levels.console)
        .format(format_console)
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .level(levels.file)
        .format(format_file)
        .chain(log_file);

    fern::Dispatch::new()
        .level(max(levels.console, levels.file))
        .level_for("serialport", LevelFilter::Info)
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Levels: console {:?}, file {:?}", levels.console, levels.file);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_console(out: fern::FormatCallback, message: &fmt::Arguments, record: &Record) {
    format_record(out, message, record, coloured_level(record.level()))
}

fn format_file(out: fern::FormatCallback, message: &fmt::Arguments, record: &Record) {
    format_record(out, message, record, level_tag(record.level()))
}

/// Debug and trace records also carry their target, the module that
/// raised them.
fn format_record<L: fmt::Display>(
    out: fern::FormatCallback,
    message: &fmt::Arguments,
    record: &Record,
    level: L
) {
    let t = session::get_elapsed_seconds();

    if record.level() > Level::Info {
        out.finish(format_args!("[{:10.6} {}] {}: {}", t, level, record.target(), message))
    }
    else {
        out.finish(format_args!("[{:10.6} {}] {}", t, level, message))
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info  => "INF",
        Level::Warn  => "WRN",
        Level::Error => "ERR"
    }
}

fn coloured_level(level: Level) -> ColoredString {
    let tag = level_tag(level);

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info  => tag.normal(),
        Level::Warn  => tag.yellow(),
        Level::Error => tag.red().bold()
    }
}
