//! Ordered analyzer registry
//!
//! Registration order is execution order. Names are not checked for
//! uniqueness: a second analyzer registered under an existing name is simply
//! another entry, run on its own, sharing that name's configuration section.

use super::Analyzer;
use crate::config::ConfigResolver;
use scrutinizer_utils::Logger;
use tracing::debug;

/// Ordered collection of analyzers
pub struct AnalyzerRegistry {
    logger: Logger,
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    /// Create an empty registry; `logger` is handed to every analyzer registered later
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            analyzers: Vec::new(),
        }
    }

    /// Register an analyzer at the end of the execution order
    pub fn register(&mut self, analyzer: impl Analyzer + 'static) {
        self.register_boxed(Box::new(analyzer));
    }

    /// Register an already boxed analyzer at the end of the execution order
    pub fn register_boxed(&mut self, mut analyzer: Box<dyn Analyzer>) {
        let logger = self.logger.named(analyzer.name());
        analyzer.set_logger(logger);

        debug!("Registered analyzer {} at position {}", analyzer.name(), self.analyzers.len());
        self.analyzers.push(analyzer);
    }

    /// Analyzers in registration order
    pub fn list(&self) -> &[Box<dyn Analyzer>] {
        &self.analyzers
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Analyzer> + '_ {
        self.analyzers.iter().map(|a| &**a)
    }

    /// Names in registration order, duplicates included
    pub fn names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// First analyzer registered under `name`
    pub fn get(&self, name: &str) -> Option<&dyn Analyzer> {
        self.iter().find(|a| a.name() == name)
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Logger analyzers are wired to
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Configuration resolver built from every registered analyzer's schema
    pub fn resolver(&self) -> ConfigResolver {
        let mut resolver = ConfigResolver::new();
        for analyzer in self.iter() {
            resolver.add_analyzer(analyzer.name(), analyzer.default_configuration());
        }
        resolver
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &self.names())
            .finish()
    }
}
