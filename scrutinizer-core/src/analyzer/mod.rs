//! Analyzer contract
//!
//! Every pluggable analysis tool implements [`Analyzer`]. The pipeline only
//! ever talks to analyzers through this trait: it asks for the name, the
//! option schema used to validate the project's configuration section, and
//! finally hands over the [`Project`] to write findings into.

use crate::models::project::Project;
use crate::Result;
use scrutinizer_utils::Logger;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod registry;

pub use registry::AnalyzerRegistry;

/// Name of the option every analyzer section carries
pub const ENABLED_OPTION: &str = "enabled";

/// Base trait for all analyzers
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    /// Unique, stable name; also the analyzer's configuration section key
    fn name(&self) -> &str;

    /// Options this analyzer recognizes, with their defaults.
    ///
    /// `enabled` defaults to `true` unless the schema declares it.
    fn default_configuration(&self) -> AnalyzerSchema {
        AnalyzerSchema::new()
    }

    /// Analyze the project and record findings in its result tree
    async fn scrutinize(&self, project: &mut Project) -> Result<()>;

    /// Receive the run's logger; called once at registration
    fn set_logger(&mut self, _logger: Logger) {}
}

/// Value shape accepted by a configuration option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Boolean,
    Integer,
    /// Integer of at least 1, e.g. a timeout in seconds
    PositiveInteger,
    String,
    StringList,
    /// List of arbitrary values
    List,
}

impl OptionKind {
    /// Whether `value` has this kind
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            OptionKind::Boolean => value.is_boolean(),
            OptionKind::Integer => value.is_i64() || value.is_u64(),
            OptionKind::PositiveInteger => value.as_u64().is_some_and(|n| n >= 1),
            OptionKind::String => value.is_string(),
            OptionKind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            OptionKind::List => value.is_array(),
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionKind::Boolean => write!(f, "boolean"),
            OptionKind::Integer => write!(f, "integer"),
            OptionKind::PositiveInteger => write!(f, "positive integer"),
            OptionKind::String => write!(f, "string"),
            OptionKind::StringList => write!(f, "list of strings"),
            OptionKind::List => write!(f, "list"),
        }
    }
}

/// One recognized option of an analyzer section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigOption {
    pub name: String,
    pub kind: OptionKind,
    pub default: Value,
    pub description: String,
}

/// Ordered set of options an analyzer accepts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyzerSchema {
    options: Vec<ConfigOption>,
}

impl AnalyzerSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a boolean option
    pub fn boolean(self, name: &str, default: bool, description: &str) -> Self {
        self.option(name, OptionKind::Boolean, Value::Bool(default), description)
    }

    /// Declare an integer option
    pub fn integer(self, name: &str, default: i64, description: &str) -> Self {
        self.option(name, OptionKind::Integer, Value::from(default), description)
    }

    /// Declare an option that must be an integer of at least 1
    pub fn positive_integer(self, name: &str, default: u64, description: &str) -> Self {
        self.option(name, OptionKind::PositiveInteger, Value::from(default), description)
    }

    /// Declare a string option
    pub fn string(self, name: &str, default: &str, description: &str) -> Self {
        self.option(name, OptionKind::String, Value::from(default), description)
    }

    /// Declare a list-of-strings option
    pub fn string_list(self, name: &str, default: &[&str], description: &str) -> Self {
        let default = Value::Array(default.iter().map(|s| Value::from(*s)).collect());
        self.option(name, OptionKind::StringList, default, description)
    }

    /// Declare a free-form list option, empty by default
    pub fn list(self, name: &str, description: &str) -> Self {
        self.option(name, OptionKind::List, Value::Array(Vec::new()), description)
    }

    /// Declare an option; redeclaring a name replaces the earlier declaration
    pub fn option(mut self, name: &str, kind: OptionKind, default: Value, description: &str) -> Self {
        self.insert(ConfigOption {
            name: name.to_string(),
            kind,
            default,
            description: description.to_string(),
        });
        self
    }

    fn insert(&mut self, option: ConfigOption) {
        match self.options.iter_mut().find(|o| o.name == option.name) {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
    }

    /// Fold another schema into this one; its declarations win on name clashes
    pub fn merge(&mut self, other: AnalyzerSchema) {
        for option in other.options {
            self.insert(option);
        }
    }

    /// Add `enabled: true` unless the schema already declares `enabled`
    pub fn with_enabled_default(mut self) -> Self {
        if self.get(ENABLED_OPTION).is_none() {
            self.options.insert(0, ConfigOption {
                name: ENABLED_OPTION.to_string(),
                kind: OptionKind::Boolean,
                default: Value::Bool(true),
                description: "Whether the analyzer runs".to_string(),
            });
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    pub fn option_names(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.name.as_str()).collect()
    }

    /// Configuration section with every option at its default
    pub fn defaults(&self) -> Map<String, Value> {
        self.options
            .iter()
            .map(|o| (o.name.clone(), o.default.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_kind_accepts() {
        assert!(OptionKind::Boolean.accepts(&json!(false)));
        assert!(!OptionKind::Boolean.accepts(&json!("false")));
        assert!(OptionKind::Integer.accepts(&json!(30)));
        assert!(!OptionKind::Integer.accepts(&json!(1.5)));
        assert!(OptionKind::Integer.accepts(&json!(-1)));
        assert!(OptionKind::PositiveInteger.accepts(&json!(1)));
        assert!(!OptionKind::PositiveInteger.accepts(&json!(0)));
        assert!(!OptionKind::PositiveInteger.accepts(&json!(-1)));
        assert!(!OptionKind::PositiveInteger.accepts(&json!(2.5)));
        assert!(OptionKind::StringList.accepts(&json!(["a", "b"])));
        assert!(!OptionKind::StringList.accepts(&json!(["a", 1])));
        assert!(OptionKind::List.accepts(&json!([{"x": 1}, 2])));
        assert!(OptionKind::String.accepts(&json!("x")));
    }

    #[test]
    fn test_schema_defaults_include_enabled() {
        let schema = AnalyzerSchema::new()
            .integer("timeout", 300, "Seconds before the tool is killed")
            .with_enabled_default();

        assert_eq!(schema.option_names(), vec!["enabled", "timeout"]);
        assert_eq!(
            Value::Object(schema.defaults()),
            json!({"enabled": true, "timeout": 300})
        );
    }

    #[test]
    fn test_schema_keeps_declared_enabled() {
        let schema = AnalyzerSchema::new()
            .boolean("enabled", false, "Off unless requested")
            .with_enabled_default();

        assert_eq!(schema.options().len(), 1);
        assert_eq!(schema.get("enabled").map(|o| &o.default), Some(&json!(false)));
    }

    #[test]
    fn test_schema_merge_later_wins() {
        let mut first = AnalyzerSchema::new()
            .integer("timeout", 10, "first")
            .string("mode", "fast", "first");
        first.merge(AnalyzerSchema::new().integer("timeout", 99, "second").list("extra", "second"));

        assert_eq!(first.option_names(), vec!["timeout", "mode", "extra"]);
        assert_eq!(first.get("timeout").map(|o| &o.default), Some(&json!(99)));
    }
}
