//! Scrutinizer Core - analyzer orchestration and the shared result tree
//!
//! This crate provides the core of the scrutinizer quality gate:
//! - The [`CodeElement`] result tree every analyzer writes into
//! - The [`Analyzer`] contract and the ordered [`AnalyzerRegistry`]
//! - The [`ConfigResolver`] that validates `.scrutinizer.yml` against the
//!   option schemas analyzers declare
//! - The [`CommandRunner`] for bounded, streamed shell commands
//! - The [`Scrutinizer`] pipeline tying it all together
//!
//! A run looks like this:
//!
//! ```no_run
//! # async fn demo() -> scrutinizer_core::Result<()> {
//! use scrutinizer_core::Scrutinizer;
//! use scrutinizer_utils::Logger;
//!
//! let scrutinizer = Scrutinizer::standard(Logger::new("scrutinizer"));
//! let project = scrutinizer.scrutinize("path/to/project", &[]).await?;
//! println!("{}", serde_json::to_string_pretty(&project)?);
//! # Ok(())
//! # }
//! ```

//#![deny(missing_docs)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::multiple_crate_versions,  // Common in large dependency trees
    clippy::module_name_repetitions,  // Often necessary for clarity
)]

pub mod models;
pub mod analyzer;
pub mod analyzers;
pub mod config;
pub mod command;
pub mod pipeline;

// Re-export commonly used types for convenience
pub use models::{
    code_element::{CodeElement, ChildRef, Location, MetricValue},
    project::{AnalyzerFailure, Project},
};
pub use analyzer::{Analyzer, AnalyzerSchema, ConfigOption, OptionKind, registry::AnalyzerRegistry};
pub use config::{ConfigResolver, FilterConfig, ResolvedConfig};
pub use command::{CommandOutput, CommandPhase, CommandRecord, CommandRunner, CommandStatus};
pub use pipeline::{AnalyzerFailurePolicy, Scrutinizer};

/// Result type used throughout scrutinizer core
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for scrutinizer core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown key, wrongly typed value or unreadable project configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The directory to scrutinize is unusable
    #[error("Environment error: {0}")]
    Environment(String),

    /// External command exceeded its time budget and was killed
    #[error("Command \"{command}\" timed out after {}", describe_duration(.timeout))]
    CommandTimeout { command: String, timeout: std::time::Duration },

    /// External command exited unsuccessfully
    #[error("Command \"{command}\" failed with {}", describe_exit(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// An analyzer failed during `scrutinize`
    #[error("Analyzer \"{analyzer}\" failed: {source}")]
    Analyzer {
        analyzer: String,
        #[source]
        source: Box<Error>,
    },

    /// Analysis error raised by an analyzer itself
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A code element was created without a type or name
    #[error("Invalid code element: {0}")]
    InvalidElement(String),

    /// Utility error
    #[error("Utility error: {0}")]
    Util(#[from] scrutinizer_utils::UtilError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error stops a pipeline run before any command or analyzer executes
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Environment(_))
    }

    /// Name of the analyzer this error is attributed to, if any
    pub fn analyzer_name(&self) -> Option<&str> {
        match self {
            Error::Analyzer { analyzer, .. } => Some(analyzer),
            _ => None,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn describe_duration(duration: &std::time::Duration) -> String {
    match duration.as_secs() {
        1 if duration.subsec_nanos() == 0 => "1 second".to_string(),
        secs if duration.subsec_nanos() == 0 => format!("{secs} seconds"),
        _ => format!("{} ms", duration.as_millis()),
    }
}
