//! Logging utilities
//!
//! Process-wide output goes through `tracing` (see [`init_logging`]). On top
//! of that, [`Logger`] is a cheap, cloneable handle that components receive
//! by injection: every line it accepts is emitted as a tracing event and
//! also fanned out to the [`LogSink`]s attached to it, so callers can keep
//! the diagnostic trail of a run (in memory or in a file).

use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log levels, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// Subscriber configuration for the process-wide tracing output
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub include_location: bool,
    pub include_thread_id: bool,
    pub colored_output: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_location: false,
            include_thread_id: false,
            colored_output: true,
        }
    }
}

/// Initialize logging with configuration.
///
/// `RUST_LOG` still wins over `config.level` when set.
pub fn init_logging(config: LoggerConfig) -> crate::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::from(config.level).into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(config.colored_output);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| crate::UtilError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Initialize logging at the given level with default formatting
pub fn basic_config(level: Option<LogLevel>) -> crate::Result<()> {
    let config = LoggerConfig {
        level: level.unwrap_or(LogLevel::Info),
        ..Default::default()
    };
    init_logging(config)
}

/// Destination for the lines written through a [`Logger`]
pub trait LogSink: Send + Sync + std::fmt::Debug {
    /// Record one line
    fn write_line(&self, level: LogLevel, logger: &str, message: &str);
}

/// One line captured by a [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub logger: String,
    pub message: String,
}

/// Sink that keeps every line in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured records
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the captured messages
    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, level: LogLevel, logger: &str, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                logger: logger.to_string(),
                message: message.to_string(),
            });
    }
}

/// File handler appending timestamped lines to a log file
#[derive(Debug)]
pub struct FileHandler {
    file: Mutex<File>,
}

impl FileHandler {
    /// Open (or create) `filename` for appending
    pub fn new(filename: &std::path::Path) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(filename)?;

        Ok(Self { file: Mutex::new(file) })
    }

    /// Write a log record to the file
    pub fn write_record(&self, level: LogLevel, target: &str, message: &str) -> io::Result<()> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{} - {} - {} - {}", timestamp, target, level, message)
    }
}

impl LogSink for FileHandler {
    fn write_line(&self, level: LogLevel, logger: &str, message: &str) {
        if let Err(e) = self.write_record(level, logger, message) {
            tracing::warn!("Failed to write log file record: {}", e);
        }
    }
}

/// Named logging handle injected into the pipeline, analyzers and command runner
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    level: LogLevel,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl Logger {
    /// Create a new logger with the given name and no sinks
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            level: LogLevel::Info,
            sinks: Vec::new(),
        }
    }

    /// Attach a sink; it receives every line at or above the logger level
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Derive a logger with another name that shares this logger's sinks and level
    pub fn named(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            level: self.level,
            sinks: self.sinks.clone(),
        }
    }

    /// Logger name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the logging level
    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    /// Get the current logging level
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Check if a level is enabled
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    /// Log a debug message
    pub fn debug(&self, message: &str) {
        if self.is_enabled(LogLevel::Debug) {
            tracing::debug!("[{}] {}", self.name, message);
            self.dispatch(LogLevel::Debug, message);
        }
    }

    /// Log an info message
    pub fn info(&self, message: &str) {
        if self.is_enabled(LogLevel::Info) {
            tracing::info!("[{}] {}", self.name, message);
            self.dispatch(LogLevel::Info, message);
        }
    }

    /// Log a warning message
    pub fn warning(&self, message: &str) {
        if self.is_enabled(LogLevel::Warning) {
            tracing::warn!("[{}] {}", self.name, message);
            self.dispatch(LogLevel::Warning, message);
        }
    }

    /// Log an error message
    pub fn error(&self, message: &str) {
        if self.is_enabled(LogLevel::Error) {
            tracing::error!("[{}] {}", self.name, message);
            self.dispatch(LogLevel::Error, message);
        }
    }

    /// Log a message at a level chosen at runtime
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => self.debug(message),
            LogLevel::Info => self.info(message),
            LogLevel::Warning => self.warning(message),
            LogLevel::Error => self.error(message),
        }
    }

    fn dispatch(&self, level: LogLevel, message: &str) {
        for sink in &self.sinks {
            sink.write_line(level, &self.name, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_levels() {
        assert!(LogLevel::Error > LogLevel::Warning);
        assert!(LogLevel::Warning > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Debug);
    }

    #[test]
    fn test_basic_config_installs_once() {
        assert!(basic_config(Some(LogLevel::Debug)).is_ok());
        assert!(matches!(basic_config(None), Err(crate::UtilError::Config(_))));
    }

    #[test]
    fn test_logger_creation() {
        let logger = Logger::new("scrutinizer");
        assert_eq!(logger.name(), "scrutinizer");
        assert_eq!(logger.level(), LogLevel::Info);
    }

    #[test]
    fn test_logger_level_filtering() {
        let sink = Arc::new(MemorySink::new());
        let mut logger = Logger::new("test").with_sink(sink.clone());
        logger.set_level(LogLevel::Warning);

        assert!(!logger.is_enabled(LogLevel::Debug));
        assert!(!logger.is_enabled(LogLevel::Info));
        assert!(logger.is_enabled(LogLevel::Warning));

        logger.info("dropped");
        logger.warning("kept");
        assert_eq!(sink.messages(), vec!["kept"]);
    }

    #[test]
    fn test_named_logger_shares_sinks() {
        let sink = Arc::new(MemorySink::new());
        let root = Logger::new("scrutinizer").with_sink(sink.clone());
        let child = root.named("loc");

        root.info("first");
        child.info("second");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].logger, "scrutinizer");
        assert_eq!(records[1].logger, "loc");
        assert_eq!(records[1].message, "second");
    }

    #[test]
    fn test_file_handler() -> io::Result<()> {
        let temp_dir = tempdir()?;
        let log_path = temp_dir.path().join("test.log");

        let handler = Arc::new(FileHandler::new(&log_path)?);
        let logger = Logger::new("test").with_sink(handler);
        logger.info("Test message");

        let content = std::fs::read_to_string(&log_path)?;
        assert!(content.contains("INFO"));
        assert!(content.contains("test"));
        assert!(content.contains("Test message"));

        Ok(())
    }
}
