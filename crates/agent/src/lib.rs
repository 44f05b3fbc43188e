pub mod analyzer;
pub mod analyzers;
pub mod classifier;
pub mod context;
pub mod coordinator;
pub mod false_positive;
pub mod generator;
pub mod reference;
pub mod response;
pub mod timeline;

pub use analyzer::{Analyzer, AnalyzerError, AnalyzerRegistry, ContextNeed};
pub use classifier::{KeywordClassifier, SeverityClassifier};
pub use context::{AnalyzerContext, ContextAssembler, ContextMap};
pub use coordinator::{Coordinator, DispatchOutcome};
pub use false_positive::FalsePositiveScorer;
pub use generator::{Scenario, SignalGenerator};
pub use reference::{ReferenceSource, StaticReference};
pub use response::ResponsePlanner;
pub use timeline::TimelineBuilder;
