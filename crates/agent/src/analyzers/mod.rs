//! Built-in heuristic analyzers.
//!
//! Each one reads the signal metadata plus its own context entry and returns
//! a deterministic opinion. They never touch shared state.

use std::sync::Arc;

mod business;
mod historical;
mod infra;
mod policy;
mod priority;

pub use business::BusinessAnalyzer;
pub use historical::HistoricalAnalyzer;
pub use infra::InfraAnalyzer;
pub use policy::PolicyAnalyzer;
pub use priority::PriorityAnalyzer;

use crate::analyzer::Analyzer;

/// Built-ins in dispatch order.
pub fn builtin() -> Vec<Arc<dyn Analyzer>> {
    vec![
        Arc::new(HistoricalAnalyzer),
        Arc::new(PolicyAnalyzer),
        Arc::new(InfraAnalyzer),
        Arc::new(BusinessAnalyzer),
        Arc::new(PriorityAnalyzer),
    ]
}
