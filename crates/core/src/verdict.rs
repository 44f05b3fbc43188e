use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::{InvestigationTimeline, ResponsePlan};
use crate::signal::Signal;

pub type VerdictId = Uuid;

/// Finding recorded on a placeholder opinion.
pub const DEGRADED_FINDING: &str = "analysis failed";
/// Recommendation recorded on a placeholder opinion.
pub const DEGRADED_RECOMMENDATION: &str = "manual review required";

/// Ordered severity scale. `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single analyzer call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub analyzer: String,
    pub narrative: String,
    /// Always within [0.0, 1.0]; 0.0 on the failure path.
    pub confidence: f64,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub elapsed_ms: u64,
}

impl Opinion {
    pub fn new(analyzer: impl Into<String>, narrative: impl Into<String>, confidence: f64) -> Self {
        Self {
            analyzer: analyzer.into(),
            narrative: narrative.into(),
            confidence: clamp_unit(confidence),
            findings: Vec::new(),
            recommendations: Vec::new(),
            elapsed_ms: 0,
        }
    }

    pub fn with_findings<I, S>(mut self, findings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.findings = findings.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_recommendations<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations = recommendations.into_iter().map(Into::into).collect();
        self
    }

    /// Placeholder standing in for an analyzer that failed, panicked or missed the deadline.
    pub fn degraded(analyzer: impl Into<String>, reason: &str, elapsed_ms: u64) -> Self {
        Self {
            analyzer: analyzer.into(),
            narrative: format!("Analysis failed: {reason}. Manual review required."),
            confidence: 0.0,
            findings: vec![DEGRADED_FINDING.to_string()],
            recommendations: vec![DEGRADED_RECOMMENDATION.to_string()],
            elapsed_ms,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.confidence == 0.0 && self.findings.first().map(String::as_str) == Some(DEGRADED_FINDING)
    }

    /// Clamp confidence into [0.0, 1.0]; NaN becomes 0.0.
    pub fn normalized(mut self) -> Self {
        self.confidence = clamp_unit(self.confidence);
        self
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// How a false-positive score translates into analyst guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FalsePositiveCall {
    LikelyFalsePositive,
    NeedsReview,
    LikelyRealThreat,
}

impl FalsePositiveCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            FalsePositiveCall::LikelyFalsePositive => "likely_false_positive",
            FalsePositiveCall::NeedsReview => "needs_review",
            FalsePositiveCall::LikelyRealThreat => "likely_real_threat",
        }
    }
}

/// One piece of evidence that moved the false-positive score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FalsePositiveIndicator {
    pub kind: String,
    pub description: String,
    /// Positive pushes toward false positive, negative toward real threat.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FalsePositiveScore {
    pub score: f64,
    pub confidence: f64,
    pub indicators: Vec<FalsePositiveIndicator>,
    pub call: FalsePositiveCall,
    pub explanation: String,
}

/// Synthesized result of analyzing one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub id: VerdictId,
    pub signal: Signal,
    pub severity: Severity,
    pub summary: String,
    /// Keyed by analyzer name, in dispatch order.
    pub opinions: IndexMap<String, Opinion>,
    pub total_elapsed_ms: u64,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub false_positive: Option<FalsePositiveScore>,
    #[serde(default)]
    pub response_plan: Option<ResponsePlan>,
    #[serde(default)]
    pub investigation_timeline: Option<InvestigationTimeline>,
    pub created_at: DateTime<Utc>,
}

impl Verdict {
    pub fn degraded_opinions(&self) -> usize {
        self.opinions.values().filter(|o| o.is_degraded()).count()
    }
}
