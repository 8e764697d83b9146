//! # Logging Utilities
//!
//! Logging setup for the postmortem tools, built on `tracing`.
//!
//! Reports produced by the tools go to stdout, so log events are written to
//! stderr and, optionally, to a file. Both sinks share one filter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use postmortem_utils::{LogConfig, init_logging};
//!
//! // Keep the guard alive until the program exits so file logs get flushed
//! let _guard = init_logging(&LogConfig::from_env()).expect("Failed to initialize logging");
//! tracing::info!("snapshot loaded");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Filter directives (e.g. `RUST_LOG=postmortem_core=debug`)
//! - `POSTMORTEM_LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
//! - `POSTMORTEM_LOG_FILE`: Also append logs to this file

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::env;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel
{
    /// Level for a `-v` count: none shows warnings, each flag adds one level.
    #[must_use]
    pub fn from_verbosity(count: u8) -> Self
    {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Where and how to log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig
{
    /// Overrides `RUST_LOG` when set.
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    /// Extra sink, appended to and never rotated.
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Settings from `POSTMORTEM_LOG_FORMAT` and `POSTMORTEM_LOG_FILE`.
    ///
    /// An unrecognized format falls back to [`LogFormat::Pretty`].
    #[must_use]
    pub fn from_env() -> Self
    {
        let format = env::var("POSTMORTEM_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let file = env::var_os("POSTMORTEM_LOG_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        Self {
            level: None,
            format,
            file,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self
    {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self
    {
        self.file = Some(file.into());
        self
    }

    /// Filter in effect: the explicit level, else `RUST_LOG`, else warnings.
    fn filter(&self) -> EnvFilter
    {
        match self.level {
            Some(level) => EnvFilter::new(Level::from(level).to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string())),
        }
    }
}

/// Flushes buffered file logs when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// ## Example
///
/// ```rust,no_run
/// use postmortem_utils::{LogConfig, LogLevel, init_logging};
///
/// let config = LogConfig::default().with_level(LogLevel::Debug).with_file("/tmp/postmortem.log");
/// let _guard = init_logging(&config).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard, LoggingError>
{
    let filter = config.filter();
    let console = event_layer(config.format, io::stderr, io::stderr().is_terminal());

    let mut layers = vec![console];
    let mut guard = None;
    if let Some(path) = &config.file {
        let (directory, file_name) = split_log_path(path)?;
        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(event_layer(config.format, writer, false));
        guard = Some(worker);
    }

    Registry::default()
        .with(layers.with_filter(filter))
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

fn event_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(ChronoUtc::rfc_3339());
    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(false).boxed(),
    }
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), LoggingError>
{
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidFile(path.to_path_buf()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&directory)?;
    Ok((directory, PathBuf::from(file_name)))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Log file path has no file name component
    #[error("Invalid log file: {}", .0.display())]
    InvalidFile(PathBuf),

    /// A global subscriber was already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!(matches!("xml".parse::<LogFormat>(), Err(LoggingError::InvalidFormat(_))));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!(matches!("loud".parse::<LogLevel>(), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_verbosity_levels()
    {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Warn);
        assert_eq!(LogLevel::from_verbosity(2), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(9), LogLevel::Trace);
        assert_eq!(Level::from(LogLevel::from_verbosity(1)), Level::INFO);
    }

    #[test]
    fn test_split_log_path()
    {
        let dir = std::env::temp_dir().join("postmortem-utils-logging-test");
        let (directory, file_name) = split_log_path(&dir.join("run.log")).unwrap();
        assert_eq!(directory, dir);
        assert_eq!(file_name, PathBuf::from("run.log"));
        assert!(dir.is_dir());

        assert!(matches!(split_log_path(Path::new("/")), Err(LoggingError::InvalidFile(_))));
    }
}
