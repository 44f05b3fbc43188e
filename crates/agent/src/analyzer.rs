use std::sync::Arc;

use async_trait::async_trait;

use warden_core::{Opinion, Signal};

use crate::context::AnalyzerContext;

/// Reference data an analyzer wants the context assembler to look up for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextNeed {
    SimilarIncidents,
    SubjectPolicy,
    InfraEvents,
    News,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("signal is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("analyzer backend unavailable: {0}")]
    Unavailable(String),

    #[error("analyzer '{0}' is already registered")]
    Duplicate(String),

    #[error("{0}")]
    Other(String),
}

/// One independent reasoning unit. Stateless per call.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable identity; keys the opinion inside a verdict.
    fn name(&self) -> &str;

    /// Lookups to perform before this analyzer runs.
    fn needs(&self) -> &'static [ContextNeed] {
        &[]
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        context: &AnalyzerContext,
    ) -> Result<Opinion, AnalyzerError>;
}

/// Ordered set of analyzers. Registration order is dispatch order.
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in analyzers: historical, policy, infra, business, priority.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for analyzer in crate::analyzers::builtin() {
            // Built-in names are distinct.
            let _ = registry.register(analyzer);
        }
        registry
    }

    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) -> Result<(), AnalyzerError> {
        if self.get(analyzer.name()).is_some() {
            return Err(AnalyzerError::Duplicate(analyzer.name().to_string()));
        }
        self.analyzers.push(analyzer);
        Ok(())
    }

    /// Builder-style registration for tests and custom fleets.
    pub fn with(mut self, analyzer: Arc<dyn Analyzer>) -> Result<Self, AnalyzerError> {
        self.register(analyzer)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Analyzer>> {
        self.analyzers.iter().find(|a| a.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Analyzer>> {
        self.analyzers.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.analyzers.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Analyzer for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn evaluate(&self, _: &Signal, _: &AnalyzerContext) -> Result<Opinion, AnalyzerError> {
            Ok(Opinion::new(self.0, "ok", 1.0))
        }
    }

    #[test]
    fn builtin_registry_has_five_in_order() {
        let registry = AnalyzerRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["historical", "policy", "infra", "business", "priority"]
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = AnalyzerRegistry::new();
        registry.register(Arc::new(Named("a"))).unwrap();
        let err = registry.register(Arc::new(Named("a"))).unwrap_err();
        assert!(matches!(err, AnalyzerError::Duplicate(name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }
}
