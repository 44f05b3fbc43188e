use async_trait::async_trait;

use warden_core::{Opinion, Signal};

use crate::analyzer::{Analyzer, AnalyzerError, ContextNeed};
use crate::context::AnalyzerContext;

/// Weighs the signal against industry news and the subject's line of business.
pub struct BusinessAnalyzer;

fn sector(subject: &str) -> Option<(&'static str, &'static str)> {
    let s = subject.to_lowercase();
    if s.contains("crypto") || s.contains("finance") {
        Some(("financial services", "Notify the fraud desk of possible account takeover"))
    } else if s.contains("health") {
        Some(("regulated health data", "Start the breach-notification checklist"))
    } else if s.contains("retail") {
        Some(("e-commerce revenue", "Protect checkout capacity for legitimate buyers"))
    } else {
        None
    }
}

#[async_trait]
impl Analyzer for BusinessAnalyzer {
    fn name(&self) -> &str {
        "business"
    }

    fn needs(&self) -> &'static [ContextNeed] {
        &[ContextNeed::News]
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        context: &AnalyzerContext,
    ) -> Result<Opinion, AnalyzerError> {
        let mut findings: Vec<String> = context
            .news
            .iter()
            .map(|n| format!("Related news: {} ({})", n.title, n.source))
            .collect();
        if let Some(reported) = signal.meta_str("context") {
            findings.push(format!("Reported context: {reported}"));
        }

        let mut recommendations = Vec::new();
        let exposure = match sector(&signal.subject) {
            Some((area, action)) => {
                recommendations.push(action.to_string());
                format!("{} operates in {area}", signal.subject)
            }
            None => format!("{} has standard business exposure", signal.subject),
        };

        let narrative = if context.news.is_empty() {
            format!("{exposure}; no external events explain this signal.")
        } else {
            recommendations.push("Check whether the news event accounts for the activity".to_string());
            format!(
                "{exposure}; {} external event(s) may bear on this signal.",
                context.news.len()
            )
        };
        let confidence = (0.55 + 0.1 * context.news.len() as f64).min(0.85);

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
    use warden_core::SignalCategory;

    #[tokio::test]
    async fn crypto_subject_picks_up_market_news() {
        let s = signal(
            SignalCategory::RateLimitBreach,
            "CryptoExchange Pro",
            json!({"context": "Bitcoin market volatility"}),
        );
        let ctx = AnalyzerContext {
            news: StaticReference::new().relevant_news(&["bitcoin".to_string()], 3),
            ..Default::default()
        };

        let opinion = BusinessAnalyzer.evaluate(&s, &ctx).await.unwrap();
        assert!(opinion.findings[0].starts_with("Related news: Bitcoin drops"));
        assert_eq!(opinion.findings[1], "Reported context: Bitcoin market volatility");
        assert!(opinion.narrative.contains("financial services"));
        assert!((opinion.confidence - 0.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_news_keeps_base_confidence() {
        let s = signal(SignalCategory::GeoAnomaly, "EduPlatform", json!({}));
        let opinion = BusinessAnalyzer
            .evaluate(&s, &AnalyzerContext::default())
            .await
            .unwrap();
        assert_eq!(opinion.confidence, 0.55);
        assert!(opinion.findings.is_empty());
    }
}
