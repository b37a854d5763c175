//! Code element tree
//!
//! A [`CodeElement`] is one node of the result tree: a file, class, function
//! or any aggregate an analyzer wants to report on. Elements are identified
//! by their `(type, name)` pair only, and a parent never holds two children
//! with the same identity: adding a duplicate keeps the element already in
//! place and drops the new one together with its metrics and subtree.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Scalar value stored under a metric key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl MetricValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are widened
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Integer(value) => Some(*value as f64),
            MetricValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Integer(value) => write!(f, "{value}"),
            MetricValue::Float(value) => write!(f, "{value}"),
            MetricValue::Bool(value) => write!(f, "{value}"),
            MetricValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        MetricValue::Integer(i64::from(value))
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        MetricValue::Integer(i64::from(value))
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// Where an element lives on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub filename: String,
}

/// Shallow `{type, name}` view of a child, as used in serialized output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChildRef<'a> {
    #[serde(rename = "type")]
    pub element_type: &'a str,
    pub name: &'a str,
}

/// One node of the result tree
#[derive(Debug, Clone)]
pub struct CodeElement {
    element_type: String,
    name: String,
    metrics: BTreeMap<String, MetricValue>,
    location: Option<Location>,
    children: Vec<CodeElement>,
}

impl CodeElement {
    /// Create an element from literals known to be non-empty.
    ///
    /// Use [`CodeElement::try_new`] for names coming from tool output.
    pub fn new(element_type: impl Into<String>, name: impl Into<String>) -> Self {
        let element_type = element_type.into();
        let name = name.into();
        debug_assert!(!element_type.is_empty(), "code element type must not be empty");
        debug_assert!(!name.is_empty(), "code element name must not be empty");

        Self {
            element_type,
            name,
            metrics: BTreeMap::new(),
            location: None,
            children: Vec::new(),
        }
    }

    /// Create an element, rejecting an empty type or name
    pub fn try_new(element_type: impl Into<String>, name: impl Into<String>) -> crate::Result<Self> {
        let element_type = element_type.into();
        let name = name.into();

        if element_type.trim().is_empty() {
            return Err(crate::Error::InvalidElement(format!(
                "element \"{name}\" has an empty type"
            )));
        }
        if name.trim().is_empty() {
            return Err(crate::Error::InvalidElement(format!(
                "element of type \"{element_type}\" has an empty name"
            )));
        }

        Ok(Self::new(element_type, name))
    }

    /// Create an element with initial metrics
    pub fn with_metrics<K, V>(
        element_type: impl Into<String>,
        name: impl Into<String>,
        metrics: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<MetricValue>,
    {
        let mut element = Self::new(element_type, name);
        for (key, value) in metrics {
            element.set_metric(key, value);
        }
        element
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key)
    }

    /// Insert or overwrite a metric
    pub fn set_metric(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.metrics.insert(key.into(), value.into());
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Replace the element's location
    pub fn set_location(&mut self, filename: impl Into<String>) {
        self.location = Some(Location { filename: filename.into() });
    }

    pub fn children(&self) -> &[CodeElement] {
        &self.children
    }

    /// Attach `child` unless an equal child is already present.
    ///
    /// On a duplicate the incoming element and everything under it is
    /// discarded; nothing is merged. The returned reference points at the
    /// child the parent holds afterwards (the pre-existing one on a duplicate).
    pub fn add_child(&mut self, child: CodeElement) -> &mut CodeElement {
        if let Some(index) = self.children.iter().position(|existing| *existing == child) {
            tracing::trace!("{} already has child {}, discarding duplicate", self, child);
            return &mut self.children[index];
        }

        let index = self.children.len();
        self.children.push(child);
        &mut self.children[index]
    }

    /// Look up a direct child by identity
    pub fn child(&self, element_type: &str, name: &str) -> Option<&CodeElement> {
        self.children
            .iter()
            .find(|c| c.element_type == element_type && c.name == name)
    }

    /// Mutable lookup of a direct child by identity
    pub fn child_mut(&mut self, element_type: &str, name: &str) -> Option<&mut CodeElement> {
        self.children
            .iter_mut()
            .find(|c| c.element_type == element_type && c.name == name)
    }

    /// `{type, name}` pairs of the direct children, in insertion order
    pub fn flattened_children(&self) -> impl Iterator<Item = ChildRef<'_>> + '_ {
        self.children.iter().map(|child| ChildRef {
            element_type: &child.element_type,
            name: &child.name,
        })
    }

    /// Depth-first, pre-order traversal starting with this element
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Identity comparison: same type and same name
    pub fn equals(&self, other: &CodeElement) -> bool {
        self.element_type == other.element_type && self.name == other.name
    }
}

impl PartialEq for CodeElement {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for CodeElement {}

impl Hash for CodeElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.element_type.hash(state);
        self.name.hash(state);
    }
}

impl std::fmt::Display for CodeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.element_type, self.name)
    }
}

impl Serialize for CodeElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let field_count = if self.location.is_some() { 5 } else { 4 };
        let mut state = serializer.serialize_struct("CodeElement", field_count)?;
        state.serialize_field("type", &self.element_type)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("metrics", &self.metrics)?;
        if let Some(location) = &self.location {
            state.serialize_field("location", location)?;
        }
        let children: Vec<ChildRef<'_>> = self.flattened_children().collect();
        state.serialize_field("children", &children)?;
        state.end()
    }
}

/// Pre-order iterator over an element and its descendants
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a CodeElement>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a CodeElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}
