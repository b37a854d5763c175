//! Scrutinizer Utilities - logging, configuration loading and path helpers
//!
//! This crate holds the ambient pieces every scrutinizer crate leans on:
//! the tracing-backed [`logging::Logger`] handle that analyzers and the
//! command runner write to, YAML/JSON/TOML loading into `serde_json::Value`
//! trees, and the file walking used to build a project's file set.

//#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod file;
pub mod config;
pub mod logging;

/// Re-export commonly used utilities
pub use file::{normalize_path, relative_path, walk_project_files, read_text_file};
pub use config::{load_value, parse_yaml_value, merge_json_values};
pub use logging::{Logger, LogLevel, LogSink, MemorySink, FileHandler};

/// Result type used throughout scrutinizer utilities
pub type Result<T> = std::result::Result<T, UtilError>;

/// Error types for utility operations
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path operation error
    #[error("Path operation error: {0}")]
    PathOperation(String),
}

/// Directory names never descended into when collecting project files
pub fn default_excluded_dirs() -> std::collections::HashSet<&'static str> {
    [
        // Version control
        ".git", ".svn", ".hg",
        // Build artifacts
        "target", "build", "dist", "__pycache__",
        // Dependencies and virtual environments
        "node_modules", "vendor", "venv", ".venv",
        // Tooling caches
        ".tox", ".pytest_cache", ".idea", ".vscode",
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excluded_dirs() {
        let dirs = default_excluded_dirs();

        assert!(dirs.contains(".git"));
        assert!(dirs.contains("node_modules"));
        assert!(dirs.contains("target"));
        assert!(!dirs.contains("src"));
    }
}
