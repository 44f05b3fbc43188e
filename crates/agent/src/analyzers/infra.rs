use async_trait::async_trait;
use chrono::Utc;

use warden_core::{Opinion, Signal, SignalCategory};

use crate::analyzer::{Analyzer, AnalyzerError, ContextNeed};
use crate::context::AnalyzerContext;

/// Correlates the signal with recent infrastructure changes.
pub struct InfraAnalyzer;

#[async_trait]
impl Analyzer for InfraAnalyzer {
    fn name(&self) -> &str {
        "infra"
    }

    fn needs(&self) -> &'static [ContextNeed] {
        &[ContextNeed::InfraEvents]
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        context: &AnalyzerContext,
    ) -> Result<Opinion, AnalyzerError> {
        let events = &context.infra_events;
        if events.is_empty() {
            return Ok(Opinion::new(
                self.name(),
                "No infrastructure changes in the last hour; the signal is not explained by platform activity.",
                0.45,
            )
            .with_findings(["No recent infrastructure changes"]));
        }

        let now = Utc::now();
        let findings: Vec<String> = events
            .iter()
            .take(3)
            .map(|e| {
                let minutes = (now - e.occurred_at).num_minutes().max(0);
                format!("{} {minutes} min ago: {}", e.kind, e.description)
            })
            .collect();

        // Traffic-shaped signals are the ones platform changes can plausibly explain.
        let traffic_shaped = matches!(
            signal.category,
            SignalCategory::RateLimitBreach | SignalCategory::AnomalyDetection | SignalCategory::BotTraffic
        );
        let explaining: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.kind.as_str(), "deployment" | "scaling" | "outage"))
            .collect();

        let mut recommendations = Vec::new();
        let (narrative, confidence) = if traffic_shaped && !explaining.is_empty() {
            recommendations.push(format!(
                "Confirm with the owners of {} before blocking",
                explaining[0].affected_services.join(", ")
            ));
            (
                format!(
                    "{} recent platform change(s) may explain this traffic pattern.",
                    explaining.len()
                ),
                0.7,
            )
        } else {
            recommendations.push("Platform activity is unrelated; continue triage".to_string());
            (
                format!(
                    "{} infrastructure change(s) in the last hour, none related to this signal.",
                    events.len()
                ),
                0.6,
            )
        };

        Ok(Opinion::new(self.name(), narrative, confidence)
            .with_findings(findings)
            .with_recommendations(recommendations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::test_support::signal;
    use crate::reference::{ReferenceSource, StaticReference};
    use serde_json::json;

    fn recent_ctx() -> AnalyzerContext {
        AnalyzerContext {
            infra_events: StaticReference::new().recent_infra_events(chrono::Duration::minutes(60), 5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn traffic_signal_correlates_with_deployment() {
        let s = signal(SignalCategory::RateLimitBreach, "Acme Corp", json!({}));
        let opinion = InfraAnalyzer.evaluate(&s, &recent_ctx()).await.unwrap();
        assert_eq!(opinion.confidence, 0.7);
        assert!(opinion.narrative.contains("may explain"));
        assert_eq!(opinion.findings.len(), 3);
    }

    #[tokio::test]
    async fn device_signal_is_unrelated() {
        let s = signal(SignalCategory::DeviceCompromise, "Acme Corp", json!({}));
        let opinion = InfraAnalyzer.evaluate(&s, &recent_ctx()).await.unwrap();
        assert_eq!(opinion.confidence, 0.6);
    }
}
