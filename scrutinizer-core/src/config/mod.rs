//! Configuration resolution
//!
//! The raw project configuration (parsed from `.scrutinizer.yml`) is checked
//! against the pipeline keys and one schema per registered analyzer, then
//! merged over the defaults. The result is immutable for the rest of the run.

use crate::analyzer::{AnalyzerSchema, ENABLED_OPTION};
use crate::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use scrutinizer_utils::config::{merge_json_values, value_kind};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub const BEFORE_COMMANDS: &str = "before_commands";
pub const AFTER_COMMANDS: &str = "after_commands";
pub const FILTER: &str = "filter";

const FILTER_KEYS: [&str; 2] = ["paths", "excluded_paths"];

/// Builds the full schema and resolves raw configuration against it
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    analyzers: Vec<(String, AnalyzerSchema)>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed an analyzer schema under `name`.
    ///
    /// Adding the same name again folds the new options into the existing section.
    pub fn add_analyzer(&mut self, name: &str, schema: AnalyzerSchema) {
        match self.analyzers.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => existing.merge(schema),
            None => self.analyzers.push((name.to_string(), schema)),
        }
    }

    /// Names of all configurable analyzer sections
    pub fn analyzer_names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn schema(&self, name: &str) -> Option<AnalyzerSchema> {
        self.analyzers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, schema)| schema.clone().with_enabled_default())
    }

    fn known_keys(&self) -> Vec<&str> {
        let mut keys = vec![BEFORE_COMMANDS, AFTER_COMMANDS, FILTER];
        keys.extend(self.analyzer_names());
        keys
    }

    /// Full default configuration, every schema at its defaults
    pub fn reference(&self) -> Value {
        let mut root = Map::new();
        root.insert(BEFORE_COMMANDS.to_string(), Value::Array(Vec::new()));
        root.insert(AFTER_COMMANDS.to_string(), Value::Array(Vec::new()));
        root.insert(FILTER.to_string(), FilterConfig::default().to_value());

        for (name, schema) in &self.analyzers {
            let defaults = schema.clone().with_enabled_default().defaults();
            root.insert(name.clone(), Value::Object(defaults));
        }

        Value::Object(root)
    }

    /// Validate `raw` and merge it over the defaults
    pub fn process(&self, raw: Value) -> Result<ResolvedConfig> {
        if let Some((name, _)) = self
            .analyzers
            .iter()
            .find(|(n, _)| [BEFORE_COMMANDS, AFTER_COMMANDS, FILTER].contains(&n.as_str()))
        {
            return Err(Error::Config(format!(
                "Analyzer name \"{name}\" collides with a reserved configuration key"
            )));
        }

        let raw = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(Error::Config(format!(
                    "The configuration must be a mapping, got {}",
                    value_kind(&other)
                )))
            }
        };

        let mut tree = self.reference();
        let mut before_commands = Vec::new();
        let mut after_commands = Vec::new();
        let mut filter = FilterConfig::default();

        for (key, value) in raw {
            let section = match key.as_str() {
                BEFORE_COMMANDS => {
                    before_commands = string_list(&key, value)?;
                    Value::from(before_commands.clone())
                }
                AFTER_COMMANDS => {
                    after_commands = string_list(&key, value)?;
                    Value::from(after_commands.clone())
                }
                FILTER => {
                    filter = FilterConfig::from_value(value)?;
                    filter.to_value()
                }
                name => {
                    let schema = self.schema(name).ok_or_else(|| {
                        Error::Config(format!(
                            "Unrecognized option \"{}\" at the root of the configuration; known keys are: {}",
                            name,
                            self.known_keys().join(", ")
                        ))
                    })?;
                    Value::Object(resolve_section(name, &schema, value)?)
                }
            };

            merge_json_values(&mut tree, Value::Object(Map::from_iter([(key, section)])));
        }

        let enabled = self
            .analyzers
            .iter()
            .map(|(name, _)| {
                let on = tree
                    .get(name)
                    .and_then(|section| section.get(ENABLED_OPTION))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                (name.clone(), on)
            })
            .collect();

        debug!("Resolved configuration: {}", tree);

        Ok(ResolvedConfig {
            tree,
            before_commands,
            after_commands,
            filter,
            enabled,
        })
    }
}

/// Check one analyzer section and return only the user-supplied overrides
fn resolve_section(name: &str, schema: &AnalyzerSchema, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Null => Ok(Map::new()),
        Value::Bool(on) => Ok(Map::from_iter([(ENABLED_OPTION.to_string(), Value::Bool(on))])),
        Value::Object(options) => {
            let mut overrides = Map::new();
            for (key, value) in options {
                let option = schema.get(&key).ok_or_else(|| {
                    Error::Config(format!(
                        "Unrecognized option \"{}\" under \"{}\"; known options are: {}",
                        key,
                        name,
                        schema.option_names().join(", ")
                    ))
                })?;

                if value.is_null() {
                    continue;
                }
                if !option.kind.accepts(&value) {
                    return Err(Error::Config(format!(
                        "Invalid value for \"{}.{}\": expected {}, got {}",
                        name,
                        key,
                        option.kind,
                        value_kind(&value)
                    )));
                }
                overrides.insert(key, value);
            }
            Ok(overrides)
        }
        other => Err(Error::Config(format!(
            "The section \"{}\" must be a mapping, got {}",
            name,
            value_kind(&other)
        ))),
    }
}

fn string_list(key: &str, value: Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(single) => Ok(vec![single]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(Error::Config(format!(
                    "Invalid entry in \"{}\": expected string, got {}",
                    key,
                    value_kind(&other)
                ))),
            })
            .collect(),
        other => Err(Error::Config(format!(
            "Invalid value for \"{}\": expected list of strings, got {}",
            key,
            value_kind(&other)
        ))),
    }
}

/// Path selection applied to the project's file set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    /// Globs a file must match to be analyzed; empty selects everything
    pub paths: Vec<String>,
    /// Globs excluding files even when `paths` selects them
    pub excluded_paths: Vec<String>,
}

impl FilterConfig {
    fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(Error::Config(format!(
                    "The section \"filter\" must be a mapping, got {}",
                    value_kind(&other)
                )))
            }
        };

        let mut filter = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "paths" => filter.paths = string_list("filter.paths", value)?,
                "excluded_paths" => filter.excluded_paths = string_list("filter.excluded_paths", value)?,
                other => {
                    return Err(Error::Config(format!(
                        "Unrecognized option \"{}\" under \"filter\"; known options are: {}",
                        other,
                        FILTER_KEYS.join(", ")
                    )))
                }
            }
        }

        // Surface bad globs at resolution time rather than mid-run
        filter.matcher()?;
        Ok(filter)
    }

    fn to_value(&self) -> Value {
        serde_json::json!({
            "paths": self.paths,
            "excluded_paths": self.excluded_paths,
        })
    }

    /// Compile the globs into a matcher over `/`-separated relative paths
    pub fn matcher(&self) -> Result<PathMatcher> {
        Ok(PathMatcher {
            include: build_glob_set(&self.paths)?,
            exclude: build_glob_set(&self.excluded_paths)?,
        })
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("Invalid filter pattern \"{pattern}\": {e}")))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| Error::Config(format!("Failed to compile filter patterns: {e}")))
}

/// Compiled [`FilterConfig`]
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathMatcher {
    /// Whether a project-relative path is selected
    pub fn is_selected(&self, relative_path: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |set| set.is_match(relative_path));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|set| set.is_match(relative_path));

        included && !excluded
    }
}

/// Final, validated configuration for one run
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    tree: Value,
    before_commands: Vec<String>,
    after_commands: Vec<String>,
    filter: FilterConfig,
    enabled: BTreeMap<String, bool>,
}

impl ResolvedConfig {
    /// Whether the analyzer section `name` is enabled; unknown names are disabled
    pub fn is_analyzer_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(false)
    }

    /// Resolved section of one analyzer
    pub fn analyzer_config(&self, name: &str) -> Option<&Map<String, Value>> {
        self.tree.get(name).and_then(Value::as_object)
    }

    pub fn before_commands(&self) -> &[String] {
        &self.before_commands
    }

    pub fn after_commands(&self) -> &[String] {
        &self.after_commands
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    /// Whole resolved tree
    pub fn as_value(&self) -> &Value {
        &self.tree
    }
}

impl Serialize for ResolvedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.tree.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> ConfigResolver {
        let mut resolver = ConfigResolver::new();
        resolver.add_analyzer(
            "loc",
            AnalyzerSchema::new().string_list("extensions", &["rs"], "Extensions to count"),
        );
        resolver.add_analyzer(
            "clippy",
            AnalyzerSchema::new()
                .boolean("enabled", false, "Opt-in")
                .positive_integer("timeout", 600, "Seconds"),
        );
        resolver
    }

    #[test]
    fn test_empty_configuration_uses_defaults() {
        let config = resolver().process(Value::Null).unwrap();

        assert!(config.before_commands().is_empty());
        assert!(config.after_commands().is_empty());
        assert!(config.is_analyzer_enabled("loc"));
        assert!(!config.is_analyzer_enabled("clippy"));
        assert!(!config.is_analyzer_enabled("unknown"));
        assert_eq!(config.analyzer_config("loc").unwrap()["extensions"], json!(["rs"]));
    }

    #[test]
    fn test_project_values_override_leaves() {
        let raw = json!({
            "before_commands": ["echo a", "echo b"],
            "clippy": {"enabled": true},
            "loc": {"extensions": ["py"]},
        });
        let config = resolver().process(raw).unwrap();

        assert_eq!(config.before_commands(), ["echo a", "echo b"]);
        assert!(config.is_analyzer_enabled("clippy"));
        assert_eq!(config.analyzer_config("clippy").unwrap()["timeout"], json!(600));
        assert_eq!(config.analyzer_config("loc").unwrap()["extensions"], json!(["py"]));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = resolver().process(json!({"lint": {}})).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("\"lint\"")));

        let err = resolver().process(json!({"loc": {"depth": 2}})).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("\"depth\"") && msg.contains("extensions")));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let err = resolver().process(json!({"clippy": {"timeout": "soon"}})).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("clippy.timeout")));

        for bad in [json!(-1), json!(0)] {
            let err = resolver().process(json!({"clippy": {"timeout": bad}})).unwrap_err();
            assert!(matches!(err, Error::Config(ref msg) if msg.contains("positive integer")));
        }

        let err = resolver().process(json!(["loc"])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_section_shorthands() {
        let config = resolver().process(json!({"loc": false, "clippy": null})).unwrap();

        assert!(!config.is_analyzer_enabled("loc"));
        assert!(!config.is_analyzer_enabled("clippy"));
        assert_eq!(config.analyzer_config("loc").unwrap()["extensions"], json!(["rs"]));
    }

    #[test]
    fn test_reserved_analyzer_name() {
        let mut resolver = resolver();
        resolver.add_analyzer("filter", AnalyzerSchema::new());
        assert!(matches!(resolver.process(Value::Null), Err(Error::Config(_))));
    }

    #[test]
    fn test_filter_matcher() {
        let raw = json!({"filter": {"paths": ["src/**"], "excluded_paths": ["src/generated/*"]}});
        let config = resolver().process(raw).unwrap();
        let matcher = config.filter().matcher().unwrap();

        assert!(matcher.is_selected("src/main.rs"));
        assert!(!matcher.is_selected("src/generated/api.rs"));
        assert!(!matcher.is_selected("tests/cli.rs"));

        let err = resolver().process(json!({"filter": {"paths": ["src/[" ]}})).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_reference_lists_every_section() {
        let reference = resolver().reference();

        assert_eq!(reference["before_commands"], json!([]));
        assert_eq!(reference["filter"], json!({"paths": [], "excluded_paths": []}));
        assert_eq!(reference["loc"], json!({"enabled": true, "extensions": ["rs"]}));
        assert_eq!(reference["clippy"], json!({"enabled": false, "timeout": 600}));
    }
}
