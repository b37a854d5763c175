//! Data models for scrutinizer results
//!
//! This module contains the result tree analyzers write into and the
//! per-run project context that owns it.

pub mod code_element;
pub mod project;

pub use code_element::{CodeElement, ChildRef, Location, MetricValue};
pub use project::{AnalyzerFailure, Project};
