//! Parallel analysis coordinator.
//!
//! Fans one signal out to every registered analyzer, waits for all of them
//! against a single shared deadline, and folds whatever came back into one
//! verdict with a response plan and investigation timeline. Analyzer failures
//! never escape: errors, panics and deadline misses all become degraded opinions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_core::config::CoordinatorConfig;
use warden_core::{
    FalsePositiveScore, NoopObserver, Opinion, OperationObserver, Outcome, Severity, Signal, Verdict,
};

use crate::analyzer::{AnalyzerError, AnalyzerRegistry};
use crate::classifier::{KeywordClassifier, SeverityClassifier};
use crate::context::{collect_incidents, find_subject_policy, AnalyzerContext, ContextMap};
use crate::false_positive::FalsePositiveScorer;
use crate::response::ResponsePlanner;
use crate::timeline::TimelineBuilder;

/// Findings quoted in a verdict summary.
pub const SUMMARY_FINDINGS: usize = 5;

/// How a single analyzer call settled.
#[derive(Debug)]
pub enum DispatchOutcome {
    Completed(Opinion),
    Failed { reason: String, elapsed_ms: u64 },
    TimedOut { elapsed_ms: u64 },
}

impl DispatchOutcome {
    fn from_join(result: Result<Result<Opinion, AnalyzerError>, JoinError>, elapsed_ms: u64) -> Self {
        match result {
            Ok(Ok(opinion)) => DispatchOutcome::Completed(opinion),
            Ok(Err(e)) => DispatchOutcome::Failed {
                reason: e.to_string(),
                elapsed_ms,
            },
            Err(e) if e.is_panic() => DispatchOutcome::Failed {
                reason: "analyzer panicked".to_string(),
                elapsed_ms,
            },
            Err(_) => DispatchOutcome::Failed {
                reason: "analyzer task cancelled".to_string(),
                elapsed_ms,
            },
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            DispatchOutcome::Completed(_) => Outcome::Ok,
            DispatchOutcome::Failed { .. } => Outcome::Failed,
            DispatchOutcome::TimedOut { .. } => Outcome::TimedOut,
        }
    }

    /// Resolve into the opinion recorded on the verdict.
    fn into_opinion(self, analyzer: &str, measured_ms: u64) -> Opinion {
        match self {
            DispatchOutcome::Completed(mut opinion) => {
                opinion.analyzer = analyzer.to_string();
                if opinion.elapsed_ms == 0 {
                    opinion.elapsed_ms = measured_ms;
                }
                opinion.normalized()
            }
            DispatchOutcome::Failed { reason, elapsed_ms } => {
                Opinion::degraded(analyzer, &reason, elapsed_ms)
            }
            DispatchOutcome::TimedOut { elapsed_ms } => {
                Opinion::degraded(analyzer, "deadline exceeded", elapsed_ms)
            }
        }
    }
}

pub struct Coordinator {
    registry: Arc<AnalyzerRegistry>,
    classifier: Arc<dyn SeverityClassifier>,
    scorer: FalsePositiveScorer,
    planner: ResponsePlanner,
    timeline: TimelineBuilder,
    observer: Arc<dyn OperationObserver>,
    deadline: Duration,
    priority_analyzer: String,
}

impl Coordinator {
    pub fn new(registry: Arc<AnalyzerRegistry>, config: &CoordinatorConfig) -> Self {
        Self {
            registry,
            classifier: Arc::new(KeywordClassifier),
            scorer: FalsePositiveScorer,
            planner: ResponsePlanner,
            timeline: TimelineBuilder,
            observer: Arc::new(NoopObserver),
            deadline: config.deadline(),
            priority_analyzer: config.priority_analyzer.clone(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn SeverityClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Analyze one signal. Always returns a verdict with one opinion per analyzer.
    pub async fn run(&self, signal: &Signal, contexts: &ContextMap) -> Verdict {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.deadline;
        let shared_signal = Arc::new(signal.clone());

        info!(
            signal_id = %signal.id,
            category = %signal.category,
            subject = %signal.subject,
            analyzers = self.registry.len(),
            "dispatching analysis"
        );

        // Spawned tasks are detached on timeout, not aborted.
        let pending: Vec<_> = self
            .registry
            .iter()
            .map(|analyzer| {
                let name = analyzer.name().to_string();
                let ctx = contexts.get(&name).cloned().unwrap_or_else(|| {
                    warn!(analyzer = %name, "no context entry; using empty context");
                    AnalyzerContext::default()
                });
                let analyzer = Arc::clone(analyzer);
                let signal = Arc::clone(&shared_signal);
                let handle = tokio::spawn(async move { analyzer.evaluate(&signal, &ctx).await });
                (name, handle)
            })
            .collect();

        let settled = join_all(pending.into_iter().map(|(name, handle)| async move {
            let outcome = match tokio::time::timeout_at(deadline, handle).await {
                Ok(joined) => DispatchOutcome::from_join(joined, elapsed_ms(start)),
                Err(_) => DispatchOutcome::TimedOut {
                    elapsed_ms: elapsed_ms(start),
                },
            };
            (name, outcome, elapsed_ms(start))
        }))
        .await;

        let mut opinions = IndexMap::with_capacity(settled.len());
        let mut priority_ok = false;
        for (name, outcome, measured_ms) in settled {
            self.observer.record(
                "analyzer",
                &name,
                outcome.outcome(),
                Duration::from_millis(measured_ms),
            );
            match &outcome {
                DispatchOutcome::Completed(_) => {
                    debug!(analyzer = %name, elapsed_ms = measured_ms, "analyzer completed");
                    if name == self.priority_analyzer {
                        priority_ok = true;
                    }
                }
                DispatchOutcome::Failed { reason, .. } => {
                    warn!(analyzer = %name, error = %reason, "analyzer failed");
                }
                DispatchOutcome::TimedOut { .. } => {
                    warn!(
                        analyzer = %name,
                        deadline_ms = self.deadline.as_millis() as u64,
                        "analyzer missed deadline"
                    );
                }
            }
            let opinion = outcome.into_opinion(&name, measured_ms);
            opinions.insert(name, opinion);
        }

        // A placeholder priority opinion drives neither severity nor review.
        let priority = opinions
            .get(&self.priority_analyzer)
            .filter(|_| priority_ok);
        let severity = self.classifier.classify(priority);
        let needs_review = priority.is_some_and(|o| {
            o.narrative.to_lowercase().contains("review") || severity == Severity::Critical
        });

        let incidents = collect_incidents(contexts);
        let false_positive = self.scorer.score(signal, &opinions, &incidents);
        let review_reason =
            needs_review.then(|| review_reason(severity, &false_positive).to_string());
        let summary = summarize(signal, severity, &opinions, &false_positive);
        let response_plan = self.planner.plan(
            signal,
            severity,
            &false_positive,
            find_subject_policy(contexts),
            &opinions,
        );
        let timeline = self
            .timeline
            .build(signal, &opinions, &false_positive, &response_plan, severity);

        let total_elapsed_ms = elapsed_ms(start);
        let degraded = opinions.values().filter(|o| o.is_degraded()).count();
        self.observer.record(
            "coordinator",
            "run",
            if degraded == 0 { Outcome::Ok } else { Outcome::Degraded },
            start.elapsed(),
        );
        info!(
            signal_id = %signal.id,
            severity = %severity,
            needs_review,
            degraded,
            elapsed_ms = total_elapsed_ms,
            "analysis complete"
        );

        Verdict {
            id: Uuid::new_v4(),
            signal: signal.clone(),
            severity,
            summary,
            opinions,
            total_elapsed_ms,
            needs_review,
            review_reason,
            false_positive: Some(false_positive),
            response_plan: Some(response_plan),
            investigation_timeline: Some(timeline),
            created_at: Utc::now(),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn review_reason(severity: Severity, fp: &FalsePositiveScore) -> &'static str {
    if severity == Severity::Critical {
        "Critical severity requires human oversight"
    } else if (0.4..=0.7).contains(&fp.score) {
        "Uncertain false positive classification"
    } else {
        "Analyzer recommended manual review"
    }
}

/// "{SEVERITY} severity {category} detected for {subject}. Key findings: a; b."
pub fn summarize(
    signal: &Signal,
    severity: Severity,
    opinions: &IndexMap<String, Opinion>,
    fp: &FalsePositiveScore,
) -> String {
    let findings: Vec<&str> = opinions
        .values()
        .flat_map(|o| o.findings.iter().map(String::as_str))
        .take(SUMMARY_FINDINGS)
        .collect();
    let key_findings = if findings.is_empty() {
        "Standard analysis completed".to_string()
    } else {
        findings.join("; ")
    };

    let mut summary = format!(
        "{severity} severity {} detected for {}. Key findings: {key_findings}.",
        signal.category.label(),
        signal.subject
    );
    if fp.score >= 0.7 {
        let pct = (fp.score * 100.0).round() as u32;
        summary.push_str(&format!(" Note: High false positive likelihood ({pct}%)."));
    } else if fp.score <= 0.3 {
        // Quoted as confidence that the threat is real.
        let pct = ((1.0 - fp.score) * 100.0).round() as u32;
        summary.push_str(&format!(" High confidence real threat ({pct}%)."));
    }
    summary
}
