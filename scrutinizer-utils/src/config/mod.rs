//! Configuration file loading
//!
//! Every supported format is loaded into a `serde_json::Value` tree so that
//! callers can merge and validate configuration independently of the syntax
//! it was written in.

use serde_json::Value;
use std::path::Path;

/// Load a configuration file into a JSON value (format picked by extension)
pub fn load_value(path: &Path) -> crate::Result<Value> {
    let extension = path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let content = std::fs::read_to_string(path)?;

    match extension.as_str() {
        "toml" => {
            let toml_value: toml::Value = toml::from_str(&content)
                .map_err(|e| crate::UtilError::Config(format!("TOML parse error: {}", e)))?;
            serde_json::to_value(toml_value)
                .map_err(|e| crate::UtilError::Config(format!("TOML conversion error: {}", e)))
        }
        "json" => {
            serde_json::from_str(&content)
                .map_err(|e| crate::UtilError::Config(format!("JSON parse error: {}", e)))
        }
        "yml" | "yaml" => parse_yaml_value(&content),
        _ => Err(crate::UtilError::Config(
            format!("Unsupported config format: {}", extension)
        )),
    }
}

/// Parse a YAML document into a JSON value.
///
/// An empty document (or one holding only comments) yields `Value::Null`.
pub fn parse_yaml_value(content: &str) -> crate::Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }

    let yaml: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| crate::UtilError::Config(format!("YAML parse error: {}", e)))?;

    serde_json::to_value(yaml)
        .map_err(|e| crate::UtilError::Config(format!("YAML conversion error: {}", e)))
}

/// Merge two JSON values in place (second overrides first).
///
/// Objects merge key by key, recursively; any other pairing replaces the base value.
pub fn merge_json_values(base: &mut Value, override_value: Value) {
    match (base, override_value) {
        (Value::Object(base_obj), Value::Object(override_obj)) => {
            for (key, value) in override_obj {
                match base_obj.get_mut(&key) {
                    Some(existing) => merge_json_values(existing, value),
                    None => {
                        base_obj.insert(key, value);
                    }
                }
            }
        }
        (base_value, override_value) => {
            *base_value = override_value;
        }
    }
}

/// Human readable name of a JSON value's kind, for error messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
