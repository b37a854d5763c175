//! Clippy analyzer
//!
//! Runs `cargo clippy` on Rust projects and reports warning counts per file.
//! Disabled unless the project configuration turns it on.

use crate::analyzer::{Analyzer, AnalyzerSchema};
use crate::command::CommandRunner;
use crate::models::code_element::CodeElement;
use crate::models::project::Project;
use crate::{Error, Result};
use scrutinizer_utils::{relative_path, LogLevel, Logger};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const NAME: &str = "clippy";

const CLIPPY_COMMAND: &str = "cargo clippy --message-format=json";

/// Cargo's exit code when compilation or linting reported errors
const CARGO_ERROR_EXIT: i32 = 101;

#[derive(Debug, Deserialize)]
struct ClippyDiagnostic {
    reason: String,
    message: Option<ClippyMessage>,
}

#[derive(Debug, Deserialize)]
struct ClippyMessage {
    level: String,
    spans: Vec<ClippySpan>,
}

#[derive(Debug, Deserialize)]
struct ClippySpan {
    file_name: String,
}

/// Count warnings per project-relative file in cargo's JSON message stream.
///
/// Lines that are not cargo messages are ignored.
pub fn parse_clippy_messages(output: &str, project_dir: &Path) -> BTreeMap<String, usize> {
    let mut warnings = BTreeMap::new();

    for line in output.lines() {
        let Ok(diagnostic) = serde_json::from_str::<ClippyDiagnostic>(line) else {
            continue;
        };
        if diagnostic.reason != "compiler-message" {
            continue;
        }
        let Some(message) = diagnostic.message else {
            continue;
        };
        if message.level != "warning" {
            continue;
        }
        if let Some(span) = message.spans.first() {
            let file = relative_path(project_dir, &project_dir.join(&span.file_name));
            *warnings.entry(file).or_insert(0) += 1;
        }
    }

    warnings
}

/// Keep the warnings of files under the run's target paths that pass the `filter` section
fn select_warnings(project: &Project, warnings: BTreeMap<String, usize>) -> Result<BTreeMap<String, usize>> {
    let matcher = project.config().filter().matcher()?;
    Ok(warnings
        .into_iter()
        .filter(|(file, _)| project.is_in_targets(file) && matcher.is_selected(file))
        .collect())
}

/// Lints Rust projects with `cargo clippy`
#[derive(Debug)]
pub struct ClippyAnalyzer {
    logger: Logger,
}

impl ClippyAnalyzer {
    pub fn new() -> Self {
        Self {
            logger: Logger::new(NAME),
        }
    }

    fn is_rust_project(directory: &Path) -> bool {
        directory.join("Cargo.toml").is_file()
    }
}

impl Default for ClippyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Analyzer for ClippyAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn default_configuration(&self) -> AnalyzerSchema {
        AnalyzerSchema::new()
            .boolean("enabled", false, "Run cargo clippy on Rust projects")
            .positive_integer("timeout", 600, "Seconds before clippy is killed")
    }

    async fn scrutinize(&self, project: &mut Project) -> Result<()> {
        if !Self::is_rust_project(project.directory()) {
            self.logger.info("No Cargo.toml found, skipping");
            return Ok(());
        }
        if which::which("cargo").is_err() {
            return Err(Error::Analysis("cargo is not available on PATH".to_string()));
        }

        let timeout: u64 = project.option_as("timeout")?;
        let runner = CommandRunner::new(project.directory(), self.logger.clone())
            .with_timeout(Duration::from_secs(timeout))
            .with_output_level(LogLevel::Debug);

        let output = match runner.run(CLIPPY_COMMAND).await {
            Ok(output) => output.stdout,
            // Compile errors still leave the warnings emitted so far on stdout
            Err(Error::CommandFailed { exit_code: Some(CARGO_ERROR_EXIT), output, .. }) => output,
            Err(e) => return Err(e),
        };

        let warnings = select_warnings(project, parse_clippy_messages(&output, project.directory()))?;
        let total: usize = warnings.values().sum();
        debug!("Clippy reported {} warnings in {} files", total, warnings.len());

        let clippy = project.root_mut().add_child(CodeElement::new(NAME, NAME));
        clippy.set_metric("warnings", total);
        for (file, count) in warnings {
            let mut element = CodeElement::new("file", file.clone());
            element.set_location(file);
            element.set_metric("warnings", count);
            clippy.add_child(element);
        }

        Ok(())
    }

    fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigResolver;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{"reason":"compiler-artifact","package_id":"demo"}
{"reason":"compiler-message","message":{"level":"warning","message":"unused variable","spans":[{"file_name":"src/main.rs","line_start":3}]}}
{"reason":"compiler-message","message":{"level":"warning","message":"needless return","spans":[{"file_name":"src/main.rs","line_start":9}]}}
{"reason":"compiler-message","message":{"level":"warning","message":"2 warnings emitted","spans":[]}}
{"reason":"compiler-message","message":{"level":"error","message":"mismatched types","spans":[{"file_name":"src/lib.rs","line_start":1}]}}
{"reason":"compiler-message","message":{"level":"warning","message":"redundant clone","spans":[{"file_name":"src/lib.rs","line_start":4}]}}
    Checking demo v0.1.0
{"reason":"build-finished","success":false}"#;

    #[test]
    fn test_parse_clippy_messages() {
        let warnings = parse_clippy_messages(SAMPLE, Path::new("/work/demo"));

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings["src/main.rs"], 2);
        assert_eq!(warnings["src/lib.rs"], 1);
    }

    #[test]
    fn test_warnings_limited_to_targets_and_filter() {
        let mut resolver = ConfigResolver::new();
        resolver.add_analyzer(NAME, ClippyAnalyzer::new().default_configuration());
        let config = resolver
            .process(serde_json::json!({"filter": {"excluded_paths": ["src/a/gen*.rs"]}}))
            .unwrap();
        let project = Project::new("/work/demo", config, vec![std::path::PathBuf::from("src/a")]);

        let warnings = BTreeMap::from([
            ("src/a/x.rs".to_string(), 2),
            ("src/a/gen_api.rs".to_string(), 4),
            ("src/b.rs".to_string(), 1),
        ]);
        let selected = select_warnings(&project, warnings).unwrap();

        assert_eq!(selected, BTreeMap::from([("src/a/x.rs".to_string(), 2)]));
    }

    #[tokio::test]
    async fn test_skips_non_rust_projects() {
        let dir = tempdir().unwrap();
        let analyzer = ClippyAnalyzer::new();

        let mut resolver = ConfigResolver::new();
        resolver.add_analyzer(NAME, analyzer.default_configuration());
        let config = resolver.process(serde_json::json!({"clippy": true})).unwrap();
        let mut project = Project::new(dir.path(), config, Vec::new());
        project.set_analyzer_name(Some(NAME));

        analyzer.scrutinize(&mut project).await.unwrap();
        assert!(project.root().children().is_empty());
    }

    #[test]
    fn test_disabled_by_default() {
        let schema = ClippyAnalyzer::new().default_configuration().with_enabled_default();
        assert_eq!(schema.get("enabled").map(|o| &o.default), Some(&serde_json::json!(false)));
    }
}
