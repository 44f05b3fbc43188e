use async_trait::async_trait;

use warden_core::{Opinion, Severity, Signal, SignalCategory};

use crate::analyzer::{Analyzer, AnalyzerError, ContextNeed};
use crate::context::AnalyzerContext;

/// Scores urgency from signal metadata and states a severity level in its narrative.
///
/// The narrative is the only channel the coordinator reads: it names the level
/// ("Severity assessed as HIGH") and asks for review when the call is borderline.
pub struct PriorityAnalyzer;

fn base_score(category: SignalCategory) -> f64 {
    match category {
        SignalCategory::DeviceCompromise => 0.55,
        SignalCategory::BotTraffic | SignalCategory::GeoAnomaly => 0.45,
        SignalCategory::ProxyNetwork | SignalCategory::AnomalyDetection => 0.4,
        SignalCategory::RateLimitBreach => 0.35,
    }
}

fn level(score: f64) -> Severity {
    if score >= 0.85 {
        Severity::Critical
    } else if score >= 0.65 {
        Severity::High
    } else if score >= 0.4 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Escalation indicators found in the metadata, with their score contribution.
fn indicators(signal: &Signal) -> Vec<(String, f64)> {
    let mut found = Vec::new();

    if let Some(sev) = signal.meta_f64("severity_score") {
        if sev >= 9.0 {
            found.push((format!("Upstream severity score {sev:.1}"), 0.35));
        } else if sev >= 7.0 {
            found.push((format!("Upstream severity score {sev:.1}"), 0.2));
        }
    }
    if signal.meta_bool("requires_immediate_action") {
        found.push(("Detector flagged immediate action".to_string(), 0.15));
    }
    if signal.meta_bool("c2_communication_detected") {
        found.push(("Command-and-control traffic observed".to_string(), 0.1));
    }
    let compromise = signal.meta_list("compromise_indicators");
    if compromise.len() >= 4 {
        found.push((format!("{} compromise indicators", compromise.len()), 0.1));
    }
    if let Some(mb) = signal.meta_f64("exfiltration_volume_mb").filter(|mb| *mb > 0.0) {
        found.push((format!("{mb:.0} MB exfiltrated"), 0.1));
    }
    if signal.meta_bool("impossible_travel_detected") {
        found.push(("Impossible travel between sessions".to_string(), 0.15));
    }
    if let Some(factor) = signal.meta_f64("breach_factor") {
        if factor >= 5.0 {
            found.push((format!("Rate limit exceeded {factor:.1}x"), 0.15));
        } else if factor >= 3.0 {
            found.push((format!("Rate limit exceeded {factor:.1}x"), 0.05));
        }
    }
    let detector_confidence = ["detection_confidence", "confidence", "anomaly_score", "risk_score"]
        .iter()
        .filter_map(|k| signal.meta_f64(k))
        .fold(0.0_f64, f64::max);
    if detector_confidence >= 0.9 {
        found.push((format!("Detector confidence {detector_confidence:.2}"), 0.1));
    }
    if signal.meta_f64("request_count").is_some_and(|n| n > 1000.0) {
        found.push(("Request volume above 1000".to_string(), 0.05));
    }

    found
}

#[async_trait]
impl Analyzer for PriorityAnalyzer {
    fn name(&self) -> &str {
        "priority"
    }

    fn needs(&self) -> &'static [ContextNeed] {
        &[]
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        _context: &AnalyzerContext,
    ) -> Result<Opinion, AnalyzerError> {
        let found = indicators(signal);
        let score = (base_score(signal.category) + found.iter().map(|(_, w)| w).sum::<f64>())
            .clamp(0.0, 1.0);
        let severity = level(score);

        let mut narrative = format!(
            "Severity assessed as {severity}. Priority score {score:.2} from {} escalation indicator(s).",
            found.len()
        );
        let mut recommendations = Vec::new();
        match severity {
            Severity::Critical => {
                narrative.push_str(" Escalate immediately; recommend analyst review.");
                recommendations.push("Page the on-call responder".to_string());
                recommendations.push("Isolate affected systems".to_string());
            }
            _ if (0.55..0.65).contains(&score) => {
                narrative.push_str(" Borderline score; recommend analyst review.");
                recommendations.push("Queue for analyst triage".to_string());
            }
            Severity::High => recommendations.push("Respond within the hour".to_string()),
            Severity::Medium => recommendations.push("Respond within the business day".to_string()),
            Severity::Low => recommendations.push("Track in the weekly digest".to_string()),
        }

        let confidence = (0.6 + 0.05 * found.len() as f64).min(0.95);
        Ok(Opinion::new(self.name(), narrative, confidence)
            .with_findings(found.into_iter().map(|(f, _)| f))
            .with_recommendations(recommendations))
    }
}
