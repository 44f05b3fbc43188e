use async_trait::async_trait;

use warden_core::{Opinion, Signal};

use crate::analyzer::{Analyzer, AnalyzerError, ContextNeed};
use crate::context::AnalyzerContext;

/// Compares the signal against past incidents of the same category or subject.
pub struct HistoricalAnalyzer;

#[async_trait]
impl Analyzer for HistoricalAnalyzer {
    fn name(&self) -> &str {
        "historical"
    }

    fn needs(&self) -> &'static [ContextNeed] {
        &[ContextNeed::SimilarIncidents]
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        context: &AnalyzerContext,
    ) -> Result<Opinion, AnalyzerError> {
        let incidents = &context.similar_incidents;
        if incidents.is_empty() {
            return Ok(Opinion::new(
                self.name(),
                "No comparable incidents on record; treating the signal as novel.",
                0.4,
            )
            .with_findings(["No prior incidents for this category or subject"])
            .with_recommendations(["Record the outcome to seed future comparisons"]));
        }

        let total = incidents.len();
        let false_positives = incidents.iter().filter(|i| i.was_false_positive).count();
        let same_subject = incidents.iter().filter(|i| i.subject == signal.subject).count();
        let same_category = incidents.iter().filter(|i| i.category == signal.category).count();
        let fp_rate = false_positives as f64 / total as f64;

        let mut findings = vec![
            format!("{total} similar incidents in the last 30 days"),
            format!("{false_positives} of {total} prior incidents were false positives"),
        ];
        if same_subject > 0 {
            findings.push(format!("{same_subject} prior incidents for {}", signal.subject));
        }

        let mut recommendations = Vec::new();
        if fp_rate > 0.5 {
            recommendations.push("Weigh prior false positives before escalating".to_string());
        } else if same_category >= 3 {
            recommendations.push(format!(
                "Apply the playbook used for recurring {} incidents",
                signal.category.label()
            ));
        } else {
            recommendations.push("Compare indicators with the most recent incident".to_string());
        }

        let latest = &incidents[0];
        let narrative = format!(
            "Found {total} comparable incidents ({false_positives} false positives). Most recent: {}.",
            latest.resolution
        );
        let confidence = 0.5 + (total.min(5) as f64) * 0.08;

        Ok(Opinion::new(self.name(), narrative, confidence)
            .with_findings(findings)
            .with_recommendations(recommendations))
    }
}
