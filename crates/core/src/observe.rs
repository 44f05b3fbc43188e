//! Observability hook shared by the coordinator and the shared store.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result classification reported for an instrumented operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Failed,
    TimedOut,
    /// Served by the process-local fallback instead of the shared service.
    Degraded,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Failed => "failed",
            Outcome::TimedOut => "timed_out",
            Outcome::Degraded => "degraded",
        }
    }
}

/// Receives `(component, operation, outcome, latency)` for every instrumented call.
///
/// Implementations must be cheap and non-blocking; they run inline on the hot path.
pub trait OperationObserver: Send + Sync {
    fn record(&self, component: &str, operation: &str, outcome: Outcome, elapsed: Duration);
}

impl<T: OperationObserver + ?Sized> OperationObserver for Arc<T> {
    fn record(&self, component: &str, operation: &str, outcome: Outcome, elapsed: Duration) {
        (**self).record(component, operation, outcome, elapsed)
    }
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl OperationObserver for NoopObserver {
    fn record(&self, _: &str, _: &str, _: Outcome, _: Duration) {}
}
