//! Log output for the `tubekeep` binary.
//!
//! Events go to two places at once. The terminal gets readable lines and
//! honours `RUST_LOG` when it is set. The log directory gets JSON lines from
//! a rolling appender, which keeps a bounded number of old files.
//!
//! Both sinks pass warnings from every crate and raise `tubekeep_*` crates
//! to the configured level.

use std::path::PathBuf;

use clap::ValueEnum;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const OWN_TARGETS: [&str; 2] = ["tubekeep_server", "tubekeep_core"];
const FILE_PREFIX: &str = "tubekeep";

/// When the log file rolls over to a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogRotation {
    /// A new file every hour.
    Hourly,
    /// A new file every day.
    Daily,
    /// One file forever.
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

/// Where logs go and how much of them.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory holding the rolling log files.
    pub directory: PathBuf,
    /// Most verbose level printed to the terminal.
    pub console_level: Level,
    /// Most verbose level written to files.
    pub file_level: Level,
    /// File rollover schedule.
    pub rotation: LogRotation,
    /// Rotated files kept on disk; 0 keeps all of them.
    pub retained_files: usize,
    /// Source locations and span open/close events on the terminal.
    pub verbose_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(default_log_directory())
    }
}

impl LoggingConfig {
    /// Defaults for `directory`. Debug builds log more and rotate hourly.
    #[must_use]
    pub fn new(directory: PathBuf) -> Self {
        let debug = cfg!(debug_assertions);
        Self {
            directory,
            console_level: if debug { Level::DEBUG } else { Level::INFO },
            file_level: if debug { Level::TRACE } else { Level::DEBUG },
            rotation: if debug {
                LogRotation::Hourly
            } else {
                LogRotation::Daily
            },
            retained_files: if debug { 24 } else { 7 },
            verbose_console: debug,
        }
    }

    /// Override the terminal level.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    /// Override the file level.
    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    /// Override the rollover schedule.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Flushes buffered file output when dropped. Hold it until exit.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Install the process-wide subscriber described by `config`.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    std::fs::create_dir_all(&config.directory).map_err(|e| {
        LoggingError::DirectoryCreationFailed {
            path: config.directory.clone(),
            reason: e.to_string(),
        }
    })?;

    let (writer, worker) = tracing_appender::non_blocking(build_appender(config)?);

    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => own_filter(config.console_level)?,
    };
    let spans = if config.verbose_console {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let console = fmt::layer()
        .with_target(config.verbose_console)
        .with_file(config.verbose_console)
        .with_line_number(config.verbose_console)
        .with_span_events(spans)
        .with_filter(console_filter);

    let file = fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(own_filter(config.file_level)?);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _worker: worker })
}

/// `<local data dir>/tubekeep/logs`, or `./tubekeep/logs` without one.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubekeep")
        .join("logs")
}

fn build_appender(config: &LoggingConfig) -> Result<RollingFileAppender, LoggingError> {
    let mut builder = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(FILE_PREFIX)
        .filename_suffix("log");
    if config.retained_files > 0 {
        builder = builder.max_log_files(config.retained_files);
    }
    builder
        .build(&config.directory)
        .map_err(|e| LoggingError::AppenderFailed(e.to_string()))
}

/// Warnings from everything, `level` from our own crates.
fn own_filter(level: Level) -> Result<EnvFilter, LoggingError> {
    let mut filter = EnvFilter::new("warn");
    for target in OWN_TARGETS {
        filter = filter.add_directive(target_directive(target, level)?);
    }
    Ok(filter)
}

fn target_directive(target: &str, level: Level) -> Result<Directive, LoggingError> {
    let raw = format!("{target}={}", level.as_str().to_ascii_lowercase());
    raw.parse()
        .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::InvalidFilter {
            reason: e.to_string(),
            directive: raw,
        })
}

/// Logging setup failures.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// Directory that was requested.
        path: PathBuf,
        /// OS error text.
        reason: String,
    },

    /// The rolling appender rejected its settings.
    #[error("Failed to open log file: {0}")]
    AppenderFailed(String),

    /// A generated filter directive did not parse.
    #[error("Invalid log filter {directive}: {reason}")]
    InvalidFilter {
        /// Directive text.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// Some other subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}
