use warden_core::{Opinion, Severity};

/// Derives a verdict severity from the priority analyzer's opinion.
///
/// `None` means the priority analyzer failed or was not registered.
pub trait SeverityClassifier: Send + Sync {
    fn classify(&self, priority: Option<&Opinion>) -> Severity;
}

/// Case-insensitive keyword match over the priority narrative.
///
/// Rules are tried in order CRITICAL, HIGH, LOW; the first hit wins and no hit
/// leaves MEDIUM.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

const RULES: [(&str, Severity); 3] = [
    ("critical", Severity::Critical),
    ("high", Severity::High),
    ("low", Severity::Low),
];

impl SeverityClassifier for KeywordClassifier {
    fn classify(&self, priority: Option<&Opinion>) -> Severity {
        let Some(opinion) = priority else {
            return Severity::Medium;
        };
        let narrative = opinion.narrative.to_lowercase();
        RULES
            .iter()
            .find(|(keyword, _)| narrative.contains(keyword))
            .map(|(_, severity)| *severity)
            .unwrap_or(Severity::Medium)
    }
}
