//! Operation metrics for the coordinator and the shared store.
//!
//! Aggregates `(component, operation, outcome, latency)` reports into
//! per-operation counters plus a ring buffer of the most recent samples,
//! exposed as JSON via `GET /metrics`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use warden_core::{OperationObserver, Outcome};

// ── Constants ────────────────────────────────────────────────────────

/// Recent samples kept for the `/metrics` response.
const RING_BUFFER_CAPACITY: usize = 300;

// ── Per-operation stats ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct OperationStats {
    ok: u64,
    failed: u64,
    timed_out: u64,
    degraded: u64,
    total_latency: Duration,
    max_latency: Duration,
}

impl OperationStats {
    fn record(&mut self, outcome: Outcome, elapsed: Duration) {
        match outcome {
            Outcome::Ok => self.ok += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::TimedOut => self.timed_out += 1,
            Outcome::Degraded => self.degraded += 1,
        }
        self.total_latency += elapsed;
        self.max_latency = self.max_latency.max(elapsed);
    }

    fn calls(&self) -> u64 {
        self.ok + self.failed + self.timed_out + self.degraded
    }
}

/// JSON-serializable stats for one `component.operation`.
#[derive(Debug, Clone, Serialize)]
pub struct OperationMetrics {
    pub calls: u64,
    pub ok: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub degraded: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
}

// ── Ring buffer ──────────────────────────────────────────────────────

/// A fixed-size ring buffer backed by `VecDeque`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an item, evicting the oldest if at capacity.
    pub fn push(&mut self, item: T) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }
}

// ── Samples ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct OperationSample {
    pub component: String,
    pub operation: String,
    pub outcome: Outcome,
    pub elapsed_ms: f64,
    pub at: DateTime<Utc>,
}

// ── Full metrics response ────────────────────────────────────────────

/// Complete JSON response from `GET /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    /// Keyed by `component.operation`.
    pub operations: BTreeMap<String, OperationMetrics>,
    pub recent: Vec<OperationSample>,
    pub total_operations: u64,
    pub uptime_secs: f64,
}

// ── MetricsCollector ─────────────────────────────────────────────────

#[derive(Debug)]
struct Inner {
    operations: BTreeMap<String, OperationStats>,
    ring: RingBuffer<OperationSample>,
    total: u64,
}

/// Thread-safe collector; cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Inner>>,
    start: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                operations: BTreeMap::new(),
                ring: RingBuffer::new(RING_BUFFER_CAPACITY),
                total: 0,
            })),
            start: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> MetricsResponse {
        let inner = self.lock();
        let operations = inner
            .operations
            .iter()
            .map(|(key, stats)| {
                let calls = stats.calls();
                let avg = if calls == 0 {
                    0.0
                } else {
                    millis(stats.total_latency) / calls as f64
                };
                (
                    key.clone(),
                    OperationMetrics {
                        calls,
                        ok: stats.ok,
                        failed: stats.failed,
                        timed_out: stats.timed_out,
                        degraded: stats.degraded,
                        avg_latency_ms: avg,
                        max_latency_ms: millis(stats.max_latency),
                    },
                )
            })
            .collect();

        MetricsResponse {
            operations,
            recent: inner.ring.iter().cloned().collect(),
            total_operations: inner.total,
            uptime_secs: self.start.elapsed().as_secs_f64(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationObserver for MetricsCollector {
    fn record(&self, component: &str, operation: &str, outcome: Outcome, elapsed: Duration) {
        let mut inner = self.lock();
        inner.total += 1;
        inner
            .operations
            .entry(format!("{component}.{operation}"))
            .or_default()
            .record(outcome, elapsed);
        inner.ring.push(OperationSample {
            component: component.to_string(),
            operation: operation.to_string(),
            outcome,
            elapsed_ms: millis(elapsed),
            at: Utc::now(),
        });
    }
}

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

// ── Tests ────────────────────────────────────────────────────────────
