//! Standard analyzer set
//!
//! Small analyzers shipped with the pipeline. Each one writes its findings
//! under a top-level element named after itself.

use crate::analyzer::Analyzer;

pub mod clippy;
pub mod custom;
pub mod loc;

pub use clippy::ClippyAnalyzer;
pub use custom::CustomAnalyzer;
pub use loc::LocAnalyzer;

/// Standard analyzers in execution order; custom commands always run last
pub fn standard_set() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(LocAnalyzer::new()),
        Box::new(ClippyAnalyzer::new()),
        Box::new(CustomAnalyzer::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_order() {
        let names: Vec<String> = standard_set().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["loc", "clippy", "custom"]);
    }
}
