//! Investigation timeline reconstruction.
//!
//! Lays the analysis out as a chronological record anchored at signal
//! creation: detection, reference lookups, one event per analyzer,
//! false-positive assessment, correlation, the severity decision and the
//! planned response.

use chrono::{Duration, Utc};
use indexmap::IndexMap;
use serde_json::json;
use tracing::debug;

use warden_core::{
    FalsePositiveScore, InvestigationTimeline, Metadata, Opinion, ResponsePlan, Severity, Signal,
    TimelineEvent, TimelineEventKind,
};

/// Analyzer events are spread by their own run time, capped at this many ms.
const ANALYSIS_SPREAD_MS: u64 = 50;

fn data(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

fn analyzer_description(name: &str) -> &'static str {
    match name {
        "historical" => "Analyzed patterns from similar past incidents",
        "policy" => "Evaluated against subject security policy",
        "infra" => "Correlated with infrastructure events",
        "business" => "Assessed business context and external factors",
        "priority" => "Determined severity and classification",
        _ => "Performed specialized analysis",
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimelineBuilder;

impl TimelineBuilder {
    pub fn build(
        &self,
        signal: &Signal,
        opinions: &IndexMap<String, Opinion>,
        fp: &FalsePositiveScore,
        plan: &ResponsePlan,
        severity: Severity,
    ) -> InvestigationTimeline {
        let start = signal.created_at;
        let at = |ms: u64| start + Duration::milliseconds(ms as i64);
        let event = |ms: u64, kind: TimelineEventKind, title: String, description: String, source: &str, payload| {
            TimelineEvent {
                timestamp: at(ms),
                event_type: kind,
                title,
                description,
                source: source.to_string(),
                data: data(payload),
                severity: None,
            }
        };

        let source_ip = signal.meta_str("source_ip").unwrap_or("unknown");
        let mut events = vec![event(
            0,
            TimelineEventKind::Detection,
            "Threat Detected".to_string(),
            format!("{} detected from {source_ip}", signal.category.title()),
            "Detection Engine",
            json!({
                "category": signal.category,
                "source_ip": source_ip,
                "subject": signal.subject,
                "request_count": signal.meta_f64("request_count").unwrap_or(0.0),
            }),
        )];

        // Reference lookups.
        let lookups = [
            (50, "Historical Data Retrieved", "Queried incident history for similar past events".to_string(), "Incident History", json!({"query_type": "similar_incidents", "time_range": "90 days"})),
            (70, "Subject Policy Loaded", format!("Retrieved security settings for {}", signal.subject), "Policy Service", json!({"subject": signal.subject})),
            (85, "Infrastructure Events Retrieved", "Queried recent deployments and infrastructure changes".to_string(), "Infrastructure", json!({"time_range": "60 minutes"})),
            (100, "Threat Intelligence Gathered", "Retrieved relevant security news and bulletins".to_string(), "Threat Intel Feed", json!({"keywords": [signal.subject, signal.category]})),
        ];
        for (ms, title, description, source, payload) in lookups {
            events.push(event(ms, TimelineEventKind::Enrichment, title.to_string(), description, source, payload));
        }

        for (name, opinion) in opinions {
            let label = warden_core::title_case(name);
            let findings: Vec<&String> = opinion.findings.iter().take(2).collect();
            events.push(event(
                100 + opinion.elapsed_ms.min(ANALYSIS_SPREAD_MS),
                TimelineEventKind::Analysis,
                format!("{label} Analysis"),
                analyzer_description(name).to_string(),
                format!("{label} Analyzer").as_str(),
                json!({
                    "confidence": opinion.confidence,
                    "key_findings": findings,
                    "elapsed_ms": opinion.elapsed_ms,
                }),
            ));
        }

        events.push(event(
            800,
            TimelineEventKind::Analysis,
            "False Positive Analysis".to_string(),
            format!("FP likelihood assessed: {}", fp.call.as_str().replace('_', " ")),
            "FP Analyzer",
            json!({
                "fp_score": fp.score,
                "confidence": fp.confidence,
                "indicators_count": fp.indicators.len(),
                "recommendation": fp.call,
            }),
        ));

        let avg_confidence = if opinions.is_empty() {
            0.0
        } else {
            opinions.values().map(|o| o.confidence).sum::<f64>() / opinions.len() as f64
        };
        events.push(event(
            900,
            TimelineEventKind::Correlation,
            "Cross-Analyzer Correlation".to_string(),
            format!("Synthesized findings from {} analyzers", opinions.len()),
            "Coordinator",
            json!({"analyzers_count": opinions.len(), "avg_confidence": avg_confidence}),
        ));
        events.push(event(
            950,
            TimelineEventKind::Correlation,
            "Pattern Matching Complete".to_string(),
            "Matched threat against known attack patterns and signatures".to_string(),
            "Pattern Matcher",
            json!({"category": signal.category}),
        ));

        let mut decision = event(
            1000,
            TimelineEventKind::Decision,
            "Severity Determination".to_string(),
            format!(
                "Threat classified as {severity} with {:.0}% FP likelihood",
                fp.score * 100.0
            ),
            "Coordinator",
            json!({"severity": severity, "fp_score": fp.score}),
        );
        decision.severity = Some(severity);
        events.push(decision);

        let primary = &plan.primary_action;
        events.push(event(
            1100,
            TimelineEventKind::Action,
            format!("Primary Action: {}", warden_core::title_case(primary.action_type.as_str())),
            primary.reason.clone(),
            "Response Planner",
            json!({
                "action_type": primary.action_type,
                "urgency": primary.urgency,
                "target": primary.target,
                "auto_executable": primary.auto_executable,
            }),
        ));
        for (idx, action) in plan.secondary_actions.iter().enumerate() {
            events.push(event(
                1100 + 20 * (idx as u64 + 1),
                TimelineEventKind::Action,
                format!("Secondary Action: {}", warden_core::title_case(action.action_type.as_str())),
                action.reason.clone(),
                "Response Planner",
                json!({
                    "action_type": action.action_type,
                    "urgency": action.urgency,
                    "target": action.target,
                }),
            ));
        }
        if !plan.escalation_path.is_empty() {
            events.push(event(
                1200,
                TimelineEventKind::Escalation,
                "Escalation Path Defined".to_string(),
                format!("Escalation chain: {}", plan.escalation_path.join(" -> ")),
                "Response Planner",
                json!({
                    "escalation_path": plan.escalation_path,
                    "sla_minutes": plan.sla_minutes,
                }),
            ));
        }

        // Stable: same-instant events keep insertion order.
        events.sort_by_key(|e| e.timestamp);

        let end_time = Utc::now();
        let duration_ms = (end_time - start).num_milliseconds().max(0) as u64;
        debug!(signal_id = %signal.id, events = events.len(), duration_ms, "timeline built");

        InvestigationTimeline {
            events,
            start_time: start,
            end_time,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponsePlanner;
    use warden_core::{FalsePositiveCall, SignalCategory};

    fn fp(score: f64) -> FalsePositiveScore {
        FalsePositiveScore {
            score,
            confidence: 0.5,
            indicators: Vec::new(),
            call: FalsePositiveCall::LikelyRealThreat,
            explanation: String::new(),
        }
    }

    fn opinions() -> IndexMap<String, Opinion> {
        let mut map = IndexMap::new();
        let mut slow = Opinion::new("historical", "n", 0.8).with_findings(["a", "b", "c"]);
        slow.elapsed_ms = 400;
        let mut fast = Opinion::new("priority", "n", 0.6);
        fast.elapsed_ms = 5;
        map.insert("historical".to_string(), slow);
        map.insert("priority".to_string(), fast);
        map
    }

    fn build(severity: Severity) -> InvestigationTimeline {
        let metadata = data(json!({"source_ip": "198.51.100.4", "user_id": "u1"}));
        let signal = Signal::new(SignalCategory::DeviceCompromise, "Acme Corp", metadata).unwrap();
        let opinions = opinions();
        let plan = ResponsePlanner.plan(&signal, severity, &fp(0.12), None, &opinions);
        TimelineBuilder.build(&signal, &opinions, &fp(0.12), &plan, severity)
    }

    #[test]
    fn events_cover_every_phase_in_order() {
        let timeline = build(Severity::Critical);

        assert_eq!(timeline.count(TimelineEventKind::Detection), 1);
        assert_eq!(timeline.count(TimelineEventKind::Enrichment), 4);
        // Two analyzers plus the false-positive assessment.
        assert_eq!(timeline.count(TimelineEventKind::Analysis), 3);
        assert_eq!(timeline.count(TimelineEventKind::Correlation), 2);
        assert_eq!(timeline.count(TimelineEventKind::Decision), 1);
        // Quarantine, escalate, block.
        assert_eq!(timeline.count(TimelineEventKind::Action), 3);
        assert_eq!(timeline.count(TimelineEventKind::Escalation), 1);

        assert!(timeline.events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(timeline.events[0].title, "Threat Detected");
        assert_eq!(timeline.events[0].description, "Device Compromise detected from 198.51.100.4");
        assert_eq!(timeline.start_time, timeline.events[0].timestamp);
        assert!(timeline.end_time >= timeline.start_time);
    }

    #[test]
    fn decision_carries_severity_and_fp_likelihood() {
        let timeline = build(Severity::High);
        let decision = timeline
            .events
            .iter()
            .find(|e| e.event_type == TimelineEventKind::Decision)
            .unwrap();
        assert_eq!(decision.severity, Some(Severity::High));
        assert_eq!(decision.description, "Threat classified as HIGH with 12% FP likelihood");

        let primary = timeline
            .events
            .iter()
            .find(|e| e.title.starts_with("Primary Action"))
            .unwrap();
        assert_eq!(primary.title, "Primary Action: Quarantine");
        assert_eq!(primary.data["target"], "u1");
    }

    #[test]
    fn analyzer_events_spread_by_run_time() {
        let timeline = build(Severity::Medium);
        let analysis: Vec<_> = timeline
            .events
            .iter()
            .filter(|e| e.source.ends_with("Analyzer") && e.source != "FP Analyzer")
            .collect();
        assert_eq!(analysis.len(), 2);
        // priority (5 ms) sorts ahead of historical (capped at 50 ms).
        assert_eq!(analysis[0].title, "Priority Analysis");
        assert_eq!(analysis[1].title, "Historical Analysis");
        assert_eq!(analysis[1].data["key_findings"], json!(["a", "b"]));
        assert_eq!(
            analysis[1].timestamp - timeline.start_time,
            Duration::milliseconds(150)
        );
    }
}
