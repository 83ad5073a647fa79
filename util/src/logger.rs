//! Mission logger
//!
//! Every line is stamped with the seconds since the session epoch. The
//! console copy carries coloured level tags, the session log file gets the
//! same text without escape codes so it can be read back after recovery.
//! Verbosity is set per module from the `[log]` table of the exec params.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{self, info, Level};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogParams {
    /// Default level for every target, e.g. `"info"`
    pub level: String,

    /// Log file name inside the session directory. The session's own name is
    /// used when absent.
    pub file_name: Option<String>,

    /// Level overrides keyed by target prefix, e.g. `"cansat_lib::vision"`
    pub modules: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Unknown log level `{1}` for `{0}`")]
    InvalidLevel(String, String),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for LogParams {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            file_name: None,
            modules: BTreeMap::new(),
        }
    }
}

impl LogParams {
    /// The default level.
    pub fn default_level(&self) -> Result<LevelFilter, LoggerInitError> {
        parse_level("default", &self.level)
    }

    /// Per target overrides, in target order.
    pub fn module_levels(&self) -> Result<Vec<(String, LevelFilter)>, LoggerInitError> {
        self.modules
            .iter()
            .map(|(target, level)| Ok((target.clone(), parse_level(target, level)?)))
            .collect()
    }

    /// Where the log file goes for the given session.
    pub fn file_path(&self, session: &session::Session) -> PathBuf {
        match &self.file_name {
            Some(name) => session.session_root.join(name),
            None => session.log_file_path.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Must only be called once, `log` accepts a single global logger.
pub fn logger_init(params: &LogParams, session: &session::Session) -> Result<(), LoggerInitError> {
    let default_level = params.default_level()?;
    let module_levels = params.module_levels()?;
    let file_path = params.file_path(session);

    let log_file = fern::log_file(&file_path).map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new().level(default_level);
    for (target, level) in module_levels.iter() {
        dispatch = dispatch.level_for(target.clone(), *level);
    }

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {}",
                prefix(session::get_elapsed_seconds(), level_tag(record.level()), record),
                message
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {}",
                prefix(session::get_elapsed_seconds(), record.level().to_string(), record),
                message
            ))
        })
        .chain(log_file);

    dispatch
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", default_level);
    for (target, level) in module_levels.iter() {
        info!("    {}: {:?}", target, level);
    }
    info!("    Log file path: {:?}", file_path);
    info!("    Platform: {}", crate::host::get_platform());

    Ok(())
}

/// Parse a level name such as `"debug"`, case insensitive.
pub fn parse_level(target: &str, level: &str) -> Result<LevelFilter, LoggerInitError> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| LoggerInitError::InvalidLevel(target.to_string(), level.to_string()))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Line prefix. Debug and trace lines name their module.
fn prefix<T: std::fmt::Display>(elapsed_s: f64, tag: T, record: &log::Record) -> String {
    if record.level() > Level::Info {
        format!("[{:10.3} {:>5}] {}:", elapsed_s, tag, short_target(record.target()))
    }
    else {
        format!("[{:10.3} {:>5}]", elapsed_s, tag)
    }
}

/// Drop the crate name from a module path, `cansat_lib::nav` reads as `nav`.
fn short_target(target: &str) -> &str {
    match target.split_once("::") {
        Some((_, rest)) => rest,
        None => target,
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRACE".dimmed().italic(),
        Level::Debug => "DEBUG".dimmed(),
        Level::Info => "INFO".normal(),
        Level::Warn => "WARN".yellow(),
        Level::Error => "ERROR".red().bold(),
    }
}
