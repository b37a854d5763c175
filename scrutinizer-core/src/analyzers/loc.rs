//! Line counting analyzer

use crate::analyzer::{Analyzer, AnalyzerSchema};
use crate::models::code_element::CodeElement;
use crate::models::project::Project;
use crate::Result;
use scrutinizer_utils::{read_text_file, Logger};
use std::path::Path;
use tracing::{debug, warn};

pub const NAME: &str = "loc";

const DEFAULT_EXTENSIONS: [&str; 12] = [
    "rs", "py", "js", "ts", "php", "go", "java", "c", "h", "cpp", "rb", "cs",
];

/// Line counts of one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub lines: usize,
    pub code_lines: usize,
    pub blank_lines: usize,
}

impl LineCounts {
    pub fn of(content: &str) -> Self {
        let lines = content.lines().count();
        let blank_lines = content.lines().filter(|line| line.trim().is_empty()).count();

        Self {
            lines,
            code_lines: lines - blank_lines,
            blank_lines,
        }
    }

    fn add(&mut self, other: LineCounts) {
        self.lines += other.lines;
        self.code_lines += other.code_lines;
        self.blank_lines += other.blank_lines;
    }

    fn record_on(self, element: &mut CodeElement) {
        element.set_metric("lines", self.lines);
        element.set_metric("code_lines", self.code_lines);
        element.set_metric("blank_lines", self.blank_lines);
    }
}

/// Counts total, code and blank lines per selected source file
#[derive(Debug, Default)]
pub struct LocAnalyzer {
    logger: Option<Logger>,
}

impl LocAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.trim_start_matches('.') == ext))
}

#[async_trait::async_trait]
impl Analyzer for LocAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn default_configuration(&self) -> AnalyzerSchema {
        AnalyzerSchema::new().string_list(
            "extensions",
            &DEFAULT_EXTENSIONS,
            "File extensions counted, without the leading dot",
        )
    }

    async fn scrutinize(&self, project: &mut Project) -> Result<()> {
        let extensions: Vec<String> = project.option_as("extensions")?;
        let files = project.selected_files()?;

        let mut counted = Vec::new();
        let mut totals = LineCounts::default();
        for file in files.iter().filter(|f| has_extension(f, &extensions)) {
            let content = match read_text_file(file) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Could not count lines of {:?}: {}", file, e);
                    continue;
                }
            };

            let counts = LineCounts::of(&content);
            totals.add(counts);
            counted.push((project.relative_path(file), counts));
        }

        debug!("Counted lines in {} files", counted.len());
        if let Some(logger) = &self.logger {
            logger.info(&format!("{} files, {} lines", counted.len(), totals.lines));
        }

        let loc = project.root_mut().add_child(CodeElement::new(NAME, NAME));
        loc.set_metric("files", counted.len());
        totals.record_on(loc);

        for (relative, counts) in counted {
            let mut element = CodeElement::new("file", relative.clone());
            element.set_location(relative);
            counts.record_on(&mut element);
            loc.add_child(element);
        }

        Ok(())
    }

    fn set_logger(&mut self, logger: Logger) {
        self.logger = Some(logger);
    }
}
