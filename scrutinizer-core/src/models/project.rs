//! Per-run execution context
//!
//! A [`Project`] owns everything one pipeline run produces: the resolved
//! configuration, the result tree, and the record of commands and tolerated
//! analyzer failures. Analyzers receive it mutably, one at a time.

use crate::command::CommandRecord;
use crate::config::ResolvedConfig;
use crate::models::code_element::CodeElement;
use crate::{Error, Result};
use scrutinizer_utils::{normalize_path, relative_path, walk_project_files};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Element type of the tree root
pub const PROJECT_ELEMENT_TYPE: &str = "project";

/// An analyzer error tolerated under the continue-on-failure policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzerFailure {
    pub analyzer: String,
    pub message: String,
}

/// Execution context shared by all analyzers of one run
#[derive(Debug)]
pub struct Project {
    directory: PathBuf,
    config: ResolvedConfig,
    paths: Vec<PathBuf>,
    root: CodeElement,
    analyzer_name: Option<String>,
    commands: Vec<CommandRecord>,
    analyzer_failures: Vec<AnalyzerFailure>,
}

impl Project {
    /// Create a context for `directory`; `paths` restricts analysis to those
    /// files or directories (relative to `directory`), empty meaning everything
    pub fn new(directory: impl Into<PathBuf>, config: ResolvedConfig, paths: Vec<PathBuf>) -> Self {
        let directory = directory.into();
        let name = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| directory.display().to_string());

        Self {
            root: CodeElement::new(PROJECT_ELEMENT_TYPE, name),
            directory,
            config,
            paths,
            analyzer_name: None,
            commands: Vec::new(),
            analyzer_failures: Vec::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Target paths given to the run
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn root(&self) -> &CodeElement {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut CodeElement {
        &mut self.root
    }

    /// Name of the analyzer currently running
    pub fn analyzer_name(&self) -> Option<&str> {
        self.analyzer_name.as_deref()
    }

    pub fn set_analyzer_name(&mut self, name: Option<&str>) {
        self.analyzer_name = name.map(str::to_string);
    }

    pub fn is_analyzer_enabled(&self, name: &str) -> bool {
        self.config.is_analyzer_enabled(name)
    }

    /// Option of the analyzer currently running
    pub fn option(&self, key: &str) -> Option<&Value> {
        let analyzer = self.analyzer_name.as_deref()?;
        self.config.analyzer_config(analyzer)?.get(key)
    }

    /// Typed option of the analyzer currently running
    pub fn option_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.option(key).ok_or_else(|| {
            Error::Config(format!(
                "Option \"{}\" is not defined for analyzer \"{}\"",
                key,
                self.analyzer_name.as_deref().unwrap_or("<none>")
            ))
        })?;

        serde_json::from_value(value.clone())
            .map_err(|e| Error::Config(format!("Option \"{key}\" has an unexpected shape: {e}")))
    }

    /// Files under analysis, after the target paths and the `filter` section.
    ///
    /// Each target is walked from itself, so naming a normally skipped
    /// directory such as `build` selects its files.
    pub fn selected_files(&self) -> Result<Vec<PathBuf>> {
        let matcher = self.config.filter().matcher()?;

        let mut files = if self.paths.is_empty() {
            walk_project_files(&self.directory)?
        } else {
            let mut files = Vec::new();
            for target in &self.paths {
                let target = normalize_path(&self.directory.join(target));
                if target.exists() {
                    files.extend(walk_project_files(&target)?);
                } else {
                    debug!("Target path {} does not exist", target.display());
                }
            }
            files.sort();
            files.dedup();
            files
        };

        files.retain(|file| matcher.is_selected(&self.relative_path(file)));
        Ok(files)
    }

    /// Whether the project-relative `file` lies under one of the target paths
    pub fn is_in_targets(&self, file: &str) -> bool {
        self.paths.is_empty()
            || self.paths.iter().any(|target| {
                let target = self.relative_path(&self.directory.join(target));
                target.is_empty()
                    || file == target
                    || file
                        .strip_prefix(target.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }

    /// `path` relative to the project directory, `/`-separated
    pub fn relative_path(&self, path: &Path) -> String {
        relative_path(&self.directory, path)
    }

    pub fn commands(&self) -> &[CommandRecord] {
        &self.commands
    }

    pub fn record_command(&mut self, record: CommandRecord) {
        self.commands.push(record);
    }

    pub fn analyzer_failures(&self) -> &[AnalyzerFailure] {
        &self.analyzer_failures
    }

    pub fn record_analyzer_failure(&mut self, analyzer: &str, error: &Error) {
        self.analyzer_failures.push(AnalyzerFailure {
            analyzer: analyzer.to_string(),
            message: error.to_string(),
        });
    }
}

impl Serialize for Project {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let elements: Vec<&CodeElement> = self.root.walk().collect();

        let mut state = serializer.serialize_struct("Project", 5)?;
        state.serialize_field("directory", &self.directory)?;
        state.serialize_field("configuration", &self.config)?;
        state.serialize_field("elements", &elements)?;
        state.serialize_field("commands", &self.commands)?;
        state.serialize_field("analyzer_failures", &self.analyzer_failures)?;
        state.end()
    }
}
