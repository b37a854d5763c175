//! Custom command analyzer
//!
//! Runs project-declared commands that print their findings as JSON:
//!
//! ```json
//! {"metrics": {"coverage": 81.5}, "elements": [{"type": "file", "name": "src/a.rs", "metrics": {"todos": 2}}]}
//! ```
//!
//! Metrics land on a top-level `custom` element, elements become its children.

use crate::analyzer::{Analyzer, AnalyzerSchema};
use crate::command::CommandRunner;
use crate::models::code_element::{CodeElement, MetricValue};
use crate::models::project::Project;
use crate::{Error, Result};
use scrutinizer_utils::{LogLevel, Logger};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const NAME: &str = "custom";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CustomOutput {
    #[serde(default)]
    metrics: BTreeMap<String, MetricValue>,
    #[serde(default)]
    elements: Vec<CustomElement>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CustomElement {
    #[serde(rename = "type")]
    element_type: String,
    name: String,
    location: Option<String>,
    #[serde(default)]
    metrics: BTreeMap<String, MetricValue>,
}

impl CustomElement {
    fn into_code_element(self) -> Result<CodeElement> {
        let mut element = CodeElement::try_new(self.element_type, self.name)?;
        for (key, value) in self.metrics {
            element.set_metric(key, value);
        }
        if let Some(filename) = self.location {
            element.set_location(filename);
        }
        Ok(element)
    }
}

/// Runs user commands and records the metrics they report
#[derive(Debug)]
pub struct CustomAnalyzer {
    logger: Logger,
}

impl CustomAnalyzer {
    pub fn new() -> Self {
        Self {
            logger: Logger::new(NAME),
        }
    }
}

impl Default for CustomAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Analyzer for CustomAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn default_configuration(&self) -> AnalyzerSchema {
        AnalyzerSchema::new()
            .string_list("commands", &[], "Commands printing a JSON report on stdout")
            .positive_integer("timeout", 300, "Seconds before each command is killed")
    }

    async fn scrutinize(&self, project: &mut Project) -> Result<()> {
        let commands: Vec<String> = project.option_as("commands")?;
        if commands.is_empty() {
            return Ok(());
        }

        let timeout: u64 = project.option_as("timeout")?;
        let runner = CommandRunner::new(project.directory(), self.logger.clone())
            .with_timeout(Duration::from_secs(timeout))
            .with_output_level(LogLevel::Debug);

        for command in &commands {
            self.logger.info(&format!("Running \"{command}\"..."));
            let output = runner.run(command).await?;

            let report: CustomOutput = serde_json::from_str(output.stdout.trim()).map_err(|e| {
                Error::Analysis(format!("Command \"{command}\" did not print a valid report: {e}"))
            })?;
            let elements = report
                .elements
                .into_iter()
                .map(CustomElement::into_code_element)
                .collect::<Result<Vec<_>>>()?;

            let custom = project.root_mut().add_child(CodeElement::new(NAME, NAME));
            for (key, value) in report.metrics {
                custom.set_metric(key, value);
            }
            for element in elements {
                custom.add_child(element);
            }
        }

        Ok(())
    }

    fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }
}
