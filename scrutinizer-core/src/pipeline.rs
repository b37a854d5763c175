//! Orchestration pipeline
//!
//! One run: check the directory, load and resolve `.scrutinizer.yml`, run the
//! before commands, run every enabled analyzer in registration order against
//! the shared [`Project`], run the after commands, hand back the project.
//! Everything is sequential; analyzers never run concurrently.

use crate::analyzer::{Analyzer, AnalyzerRegistry};
use crate::analyzers;
use crate::command::{CommandPhase, CommandRecord, DEFAULT_COMMAND_TIMEOUT};
use crate::config::{ConfigResolver, ResolvedConfig};
use crate::models::project::Project;
use crate::{Error, Result};
use scrutinizer_utils::{load_value, Logger, UtilError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Project configuration file looked up in the scrutinized directory
pub const CONFIG_FILE_NAME: &str = ".scrutinizer.yml";

/// What to do when an analyzer's `scrutinize` fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum AnalyzerFailurePolicy {
    /// Stop the run with the analyzer's error
    #[default]
    Abort,
    /// Log the error, record it on the project and move to the next analyzer
    Continue,
}

impl std::fmt::Display for AnalyzerFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerFailurePolicy::Abort => write!(f, "abort"),
            AnalyzerFailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

/// The analyzer orchestrator
pub struct Scrutinizer {
    registry: AnalyzerRegistry,
    logger: Logger,
    command_timeout: Duration,
    failure_policy: AnalyzerFailurePolicy,
    config_file_name: String,
}

impl Scrutinizer {
    /// Create a pipeline running `analyzers` in the given order
    pub fn new(logger: Logger, analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        let mut registry = AnalyzerRegistry::new(logger.clone());
        for analyzer in analyzers {
            registry.register_boxed(analyzer);
        }

        Self {
            registry,
            logger,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            failure_policy: AnalyzerFailurePolicy::default(),
            config_file_name: CONFIG_FILE_NAME.to_string(),
        }
    }

    /// Pipeline with the standard analyzer set
    pub fn standard(logger: Logger) -> Self {
        Self::new(logger, analyzers::standard_set())
    }

    /// Append an analyzer to the execution order
    pub fn register_analyzer(&mut self, analyzer: impl Analyzer + 'static) {
        self.registry.register(analyzer);
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: AnalyzerFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_config_file_name(mut self, name: &str) -> Self {
        self.config_file_name = name.to_string();
        self
    }

    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    /// Resolver covering the pipeline keys and every registered analyzer
    pub fn configuration(&self) -> ConfigResolver {
        self.registry.resolver()
    }

    /// Load and resolve the configuration file of `directory`.
    ///
    /// A missing or empty file resolves to the defaults. The file name's
    /// extension picks the syntax (YAML, JSON or TOML).
    pub fn load_configuration(&self, directory: &Path) -> Result<ResolvedConfig> {
        let path = directory.join(&self.config_file_name);

        let raw = if path.is_file() {
            load_value(&path).map_err(|e| match e {
                UtilError::Io(io) => Error::Io(io),
                other => Error::Config(format!("Failed to parse {}: {}", path.display(), other)),
            })?
        } else {
            debug!("No {} in {}, using defaults", self.config_file_name, directory.display());
            serde_json::Value::Null
        };

        self.configuration().process(raw)
    }

    /// Run the whole pipeline on `directory`.
    ///
    /// `paths` narrows analysis to files below those project-relative paths.
    pub async fn scrutinize(&self, directory: impl AsRef<Path>, paths: &[PathBuf]) -> Result<Project> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(Error::Environment(format!(
                "The directory \"{}\" does not exist.",
                directory.display()
            )));
        }
        let directory = directory.canonicalize()?;

        let config = self.load_configuration(&directory)?;
        let mut project = Project::new(&directory, config, paths.to_vec());
        info!("Scrutinizing {}", directory.display());

        let before_commands = project.config().before_commands().to_vec();
        self.run_commands(&mut project, CommandPhase::Before, &before_commands).await;

        for analyzer in self.registry.iter() {
            let name = analyzer.name();
            if !project.is_analyzer_enabled(name) {
                debug!("Analyzer {} is disabled, skipping", name);
                continue;
            }

            self.logger.info(&format!("Running analyzer \"{name}\"..."));
            project.set_analyzer_name(Some(name));

            if let Err(e) = analyzer.scrutinize(&mut project).await {
                let error = Error::Analyzer {
                    analyzer: name.to_string(),
                    source: Box::new(e),
                };
                match self.failure_policy {
                    AnalyzerFailurePolicy::Abort => return Err(error),
                    AnalyzerFailurePolicy::Continue => {
                        self.logger.error(&error.to_string());
                        project.record_analyzer_failure(name, &error);
                    }
                }
            }
        }
        project.set_analyzer_name(None);

        let after_commands = project.config().after_commands().to_vec();
        self.run_commands(&mut project, CommandPhase::After, &after_commands).await;

        Ok(project)
    }

    /// Run every command of a phase, recording each outcome; failures do not stop the phase
    async fn run_commands(&self, project: &mut Project, phase: CommandPhase, commands: &[String]) {
        if commands.is_empty() {
            return;
        }

        self.logger.info(&format!("Executing {phase} commands"));

        for command in commands {
            self.logger.info(&format!("Running \"{command}\"..."));

            let started = Instant::now();
            let result =
                crate::command::run(command, project.directory(), self.command_timeout, &self.logger).await;
            if let Err(e) = &result {
                self.logger.warning(&e.to_string());
            }

            project.record_command(CommandRecord::from_result(phase, command, &result, started.elapsed()));
        }
    }
}

impl std::fmt::Debug for Scrutinizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scrutinizer")
            .field("registry", &self.registry)
            .field("command_timeout", &self.command_timeout)
            .field("failure_policy", &self.failure_policy)
            .field("config_file_name", &self.config_file_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_configuration_defaults_without_file() {
        let dir = tempdir().unwrap();
        let scrutinizer = Scrutinizer::standard(Logger::new("test"));

        let config = scrutinizer.load_configuration(dir.path()).unwrap();
        assert!(config.is_analyzer_enabled("loc"));
        assert!(!config.is_analyzer_enabled("clippy"));
        assert!(config.before_commands().is_empty());
    }

    #[test]
    fn test_load_configuration_empty_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let scrutinizer = Scrutinizer::standard(Logger::new("test"));

        assert!(scrutinizer.load_configuration(dir.path()).is_ok());
    }

    #[test]
    fn test_load_configuration_custom_file_name() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("quality.yml"), "loc: false\n").unwrap();
        let scrutinizer = Scrutinizer::standard(Logger::new("test")).with_config_file_name("quality.yml");

        let config = scrutinizer.load_configuration(dir.path()).unwrap();
        assert!(!config.is_analyzer_enabled("loc"));
    }

    #[test]
    fn test_load_configuration_toml_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("scrutinizer.toml"), "before_commands = [\"make\"]\n").unwrap();
        let scrutinizer = Scrutinizer::standard(Logger::new("test")).with_config_file_name("scrutinizer.toml");

        let config = scrutinizer.load_configuration(dir.path()).unwrap();
        assert_eq!(config.before_commands(), ["make"]);
    }

    #[test]
    fn test_unparsable_file_is_config_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "loc: [unclosed\n").unwrap();
        let scrutinizer = Scrutinizer::standard(Logger::new("test"));

        assert!(matches!(scrutinizer.load_configuration(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_policy_is_abort() {
        assert_eq!(AnalyzerFailurePolicy::default(), AnalyzerFailurePolicy::Abort);
        assert_eq!(AnalyzerFailurePolicy::Continue.to_string(), "continue");
    }
}
