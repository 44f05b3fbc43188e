use async_trait::async_trait;

use warden_core::{Opinion, Signal, SignalCategory};

use crate::analyzer::{Analyzer, AnalyzerError, ContextNeed};
use crate::context::AnalyzerContext;
use crate::reference::{Sensitivity, SubjectPolicy};

/// Checks the signal against the subject's configured limits and restrictions.
pub struct PolicyAnalyzer;

#[async_trait]
impl Analyzer for PolicyAnalyzer {
    fn name(&self) -> &str {
        "policy"
    }

    fn needs(&self) -> &'static [ContextNeed] {
        &[ContextNeed::SubjectPolicy]
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        context: &AnalyzerContext,
    ) -> Result<Opinion, AnalyzerError> {
        let policy = context
            .subject_policy
            .clone()
            .unwrap_or_else(|| SubjectPolicy::fallback(&signal.subject));

        let mut findings = Vec::new();
        let mut recommendations = Vec::new();

        if let Some(observed) = observed_rate_per_minute(signal) {
            let limit = policy.rate_limit_per_minute as f64;
            if limit > 0.0 && observed > limit {
                findings.push(format!(
                    "Observed rate {observed:.0}/min exceeds the {limit:.0}/min limit ({:.1}x)",
                    observed / limit
                ));
                recommendations.push("Throttle the offending source at the edge".to_string());
            }
        }

        let restricted: Vec<&str> = signal
            .meta_list("geographic_spread")
            .into_iter()
            .filter(|c| policy.geo_restrictions.iter().any(|r| r == c))
            .collect();
        if !restricted.is_empty() {
            findings.push(format!("Traffic from restricted regions: {}", restricted.join(", ")));
            recommendations.push("Block restricted regions for this subject".to_string());
        }

        let automation = matches!(
            signal.category,
            SignalCategory::BotTraffic | SignalCategory::ProxyNetwork
        );
        if automation && policy.bot_sensitivity == Sensitivity::High {
            findings.push("Subject policy requires strict automation controls".to_string());
            recommendations.push("Challenge suspected automation with step-up verification".to_string());
        }

        let violations = findings.len();
        let (narrative, confidence) = if violations == 0 {
            findings.push(format!("Signal is within configured limits for {}", policy.subject));
            (
                format!("No policy violations against the {} configuration.", policy.subject),
                0.5,
            )
        } else {
            (
                format!(
                    "{violations} policy violation(s) against the {} configuration.",
                    policy.subject
                ),
                (0.55 + 0.1 * violations as f64).min(0.9),
            )
        };

        Ok(Opinion::new(self.name(), narrative, confidence)
            .with_findings(findings)
            .with_recommendations(recommendations))
    }
}

fn observed_rate_per_minute(signal: &Signal) -> Option<f64> {
    signal
        .meta_f64("actual_rate")
        .or_else(|| signal.meta_f64("requests_per_second").map(|rps| rps * 60.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::test_support::signal;
    use serde_json::json;

    fn ctx(policy: SubjectPolicy) -> AnalyzerContext {
        AnalyzerContext {
            subject_policy: Some(policy),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn flags_rate_over_limit() {
        let s = signal(
            SignalCategory::RateLimitBreach,
            "CryptoExchange Pro",
            json!({"actual_rate": 850, "configured_limit": 150}),
        );
        let mut policy = SubjectPolicy::fallback("CryptoExchange Pro");
        policy.rate_limit_per_minute = 150;

        let opinion = PolicyAnalyzer.evaluate(&s, &ctx(policy)).await.unwrap();
        assert!(opinion.findings[0].contains("850/min exceeds the 150/min limit"));
        assert!(opinion.narrative.starts_with("1 policy violation"));
    }

    #[tokio::test]
    async fn flags_restricted_regions() {
        let s = signal(
            SignalCategory::ProxyNetwork,
            "Global Finance",
            json!({"geographic_spread": ["US", "RU", "DE"]}),
        );
        let mut policy = SubjectPolicy::fallback("Global Finance");
        policy.geo_restrictions = vec!["RU".into(), "CN".into()];

        let opinion = PolicyAnalyzer.evaluate(&s, &ctx(policy)).await.unwrap();
        assert_eq!(opinion.findings, vec!["Traffic from restricted regions: RU"]);
    }

    #[tokio::test]
    async fn missing_policy_uses_fallback() {
        let s = signal(SignalCategory::GeoAnomaly, "Nobody Ltd", json!({}));
        let opinion = PolicyAnalyzer
            .evaluate(&s, &AnalyzerContext::default())
            .await
            .unwrap();
        assert_eq!(opinion.confidence, 0.5);
        assert!(opinion.recommendations.is_empty());
    }
}
