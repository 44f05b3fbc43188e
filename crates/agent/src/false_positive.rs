//! False-positive likelihood scoring.
//!
//! Starts from a per-category baseline and shifts it by weighted evidence
//! found in the signal, incident history and analyzer confidence.

use indexmap::IndexMap;
use tracing::debug;

use warden_core::{
    FalsePositiveCall, FalsePositiveIndicator, FalsePositiveScore, Opinion, Signal, SignalCategory,
};

use crate::reference::Incident;

/// Indicator weights are scaled by this before being added to the baseline.
const WEIGHT_SCALE: f64 = 0.3;

const BENIGN_USER_AGENTS: [&str; 8] = [
    "googlebot",
    "bingbot",
    "slackbot",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "pingdom",
    "uptimerobot",
];
const SUSPICIOUS_USER_AGENTS: [&str; 4] = ["python-requests", "curl", "wget", "scanner"];
const BENIGN_IP_PREFIXES: [&str; 3] = ["66.249.", "157.55.", "40.77."];
const INTERNAL_IP_PREFIXES: [&str; 2] = ["10.", "192.168."];
const HEALTH_ENDPOINTS: [&str; 4] = ["/health", "/ping", "/status", "/ready"];

pub fn baseline_rate(category: SignalCategory) -> f64 {
    match category {
        SignalCategory::BotTraffic => 0.35,
        SignalCategory::ProxyNetwork => 0.40,
        SignalCategory::DeviceCompromise => 0.10,
        SignalCategory::AnomalyDetection => 0.50,
        SignalCategory::RateLimitBreach => 0.45,
        SignalCategory::GeoAnomaly => 0.55,
    }
}

fn indicator(kind: &str, description: String, weight: f64) -> FalsePositiveIndicator {
    FalsePositiveIndicator {
        kind: kind.to_string(),
        description,
        weight,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FalsePositiveScorer;

impl FalsePositiveScorer {
    pub fn score(
        &self,
        signal: &Signal,
        opinions: &IndexMap<String, Opinion>,
        incidents: &[Incident],
    ) -> FalsePositiveScore {
        let mut indicators = Vec::new();
        indicators.extend(user_agent(signal));
        indicators.extend(known_ip_range(signal));
        indicators.extend(request_volume(signal));
        indicators.extend(history(signal, incidents));
        indicators.extend(analyzer_confidence(opinions));
        indicators.extend(benign_traffic(signal));

        let total_weight: f64 = indicators.iter().map(|i| i.weight).sum();
        let score = (baseline_rate(signal.category) + total_weight * WEIGHT_SCALE).clamp(0.0, 1.0);

        let mut confidence = 0.5;
        if !incidents.is_empty() {
            confidence += (incidents.len() as f64 * 0.05).min(0.3);
        }
        if !indicators.is_empty() {
            confidence += (indicators.len() as f64 * 0.04).min(0.2);
        }

        let (call, explanation) = if score >= 0.7 {
            (
                FalsePositiveCall::LikelyFalsePositive,
                "Multiple indicators suggest a false positive; consider a quick dismissal.",
            )
        } else if score >= 0.4 {
            (
                FalsePositiveCall::NeedsReview,
                "Mixed signals; an analyst should confirm the threat status.",
            )
        } else {
            (
                FalsePositiveCall::LikelyRealThreat,
                "Evidence points to a real threat; prioritize investigation.",
            )
        };

        debug!(
            signal_id = %signal.id,
            score,
            indicators = indicators.len(),
            "false-positive score computed"
        );

        FalsePositiveScore {
            score: round3(score),
            confidence: round3(confidence.min(1.0)),
            indicators,
            call,
            explanation: explanation.to_string(),
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn user_agent(signal: &Signal) -> Option<FalsePositiveIndicator> {
    let ua = signal.meta_str("user_agent")?.to_lowercase();
    if let Some(bot) = BENIGN_USER_AGENTS.iter().find(|b| ua.contains(*b)) {
        return Some(indicator(
            "user_agent",
            format!("User agent matches known benign crawler: {bot}"),
            0.4,
        ));
    }
    SUSPICIOUS_USER_AGENTS
        .iter()
        .find(|p| ua.contains(*p))
        .map(|p| indicator("user_agent", format!("User agent contains suspicious pattern: {p}"), -0.2))
}

fn known_ip_range(signal: &Signal) -> Option<FalsePositiveIndicator> {
    let ip = signal.meta_str("source_ip")?;
    BENIGN_IP_PREFIXES
        .iter()
        .find(|p| ip.starts_with(*p))
        .map(|p| indicator("source_ip", format!("IP in known benign provider range {p}*"), 0.5))
}

fn request_volume(signal: &Signal) -> Option<FalsePositiveIndicator> {
    let count = signal.meta_f64("request_count")?;
    let window = signal.meta_f64("time_window_minutes").unwrap_or(5.0).max(1.0);
    let rpm = count / window;
    if rpm < 10.0 {
        Some(indicator(
            "request_volume",
            format!("Only {rpm:.1} requests/minute, consistent with normal traffic"),
            0.2,
        ))
    } else if rpm > 1000.0 {
        Some(indicator(
            "request_volume",
            format!("{rpm:.0} requests/minute indicates automation"),
            -0.3,
        ))
    } else {
        None
    }
}

fn history(signal: &Signal, incidents: &[Incident]) -> Vec<FalsePositiveIndicator> {
    let mut found = Vec::new();
    if incidents.is_empty() {
        return found;
    }

    let total = incidents.len();
    let fp = incidents.iter().filter(|i| i.was_false_positive).count();
    let rate = fp as f64 / total as f64;
    if rate > 0.5 {
        found.push(indicator(
            "history",
            format!("{fp}/{total} similar incidents were false positives"),
            0.3,
        ));
    } else if rate < 0.2 {
        found.push(indicator(
            "history",
            format!("Only {fp}/{total} similar incidents were false positives"),
            -0.3,
        ));
    }

    let same_subject: Vec<_> = incidents.iter().filter(|i| i.subject == signal.subject).collect();
    if same_subject.len() >= 3 {
        let subject_fp = same_subject.iter().filter(|i| i.was_false_positive).count();
        if subject_fp >= 2 {
            found.push(indicator(
                "subject_history",
                format!("{} has {subject_fp} previous false positives", signal.subject),
                0.25,
            ));
        }
    }
    found
}

fn analyzer_confidence(opinions: &IndexMap<String, Opinion>) -> Option<FalsePositiveIndicator> {
    if opinions.is_empty() {
        return None;
    }
    let avg = opinions.values().map(|o| o.confidence).sum::<f64>() / opinions.len() as f64;
    if avg < 0.5 {
        Some(indicator(
            "analyzer_confidence",
            format!("Average analyzer confidence is {:.0}%", avg * 100.0),
            0.2,
        ))
    } else if avg > 0.85 {
        Some(indicator(
            "analyzer_confidence",
            format!("Average analyzer confidence is {:.0}%", avg * 100.0),
            -0.2,
        ))
    } else {
        None
    }
}

fn benign_traffic(signal: &Signal) -> Option<FalsePositiveIndicator> {
    if let Some(endpoint) = signal.meta_str("endpoint") {
        if HEALTH_ENDPOINTS.contains(&endpoint.to_lowercase().as_str()) {
            return Some(indicator(
                "endpoint",
                "Traffic to a health-check endpoint is typically benign".to_string(),
                0.4,
            ));
        }
    }
    let ip = signal.meta_str("source_ip")?;
    INTERNAL_IP_PREFIXES
        .iter()
        .any(|p| ip.starts_with(p))
        .then(|| indicator("source_ip", "Traffic from the internal network".to_string(), 0.3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use warden_core::Metadata;

    fn signal(category: SignalCategory, metadata: serde_json::Value) -> Signal {
        let metadata: Metadata = metadata.as_object().cloned().unwrap_or_default();
        Signal::new(category, "Acme Corp", metadata).unwrap()
    }

    fn incident(id: usize, subject: &str, fp: bool) -> Incident {
        Incident {
            id: format!("incident_{id}"),
            subject: subject.to_string(),
            category: SignalCategory::BotTraffic,
            occurred_at: Utc::now(),
            resolution: String::new(),
            was_false_positive: fp,
        }
    }

    fn opinions(confidence: f64) -> IndexMap<String, Opinion> {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Opinion::new("a", "n", confidence));
        map
    }

    #[test]
    fn benign_crawler_from_google_range_is_false_positive() {
        let s = signal(
            SignalCategory::BotTraffic,
            json!({"user_agent": "Mozilla/5.0 (compatible; Googlebot/2.1)", "source_ip": "66.249.66.1"}),
        );
        let result = FalsePositiveScorer.score(&s, &opinions(0.7), &[]);
        // 0.35 + (0.4 + 0.5) * 0.3
        assert_eq!(result.score, 0.62);
        assert_eq!(result.call, FalsePositiveCall::NeedsReview);
        assert_eq!(result.indicators.len(), 2);
        assert_eq!(result.confidence, 0.58);
    }

    #[test]
    fn scripted_high_volume_compromise_is_real() {
        let s = signal(
            SignalCategory::DeviceCompromise,
            json!({"user_agent": "curl/7.68.0", "request_count": 9000, "time_window_minutes": 5}),
        );
        let history: Vec<_> = (0..6).map(|i| incident(i, "Other", false)).collect();
        let result = FalsePositiveScorer.score(&s, &opinions(0.9), &history);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.call, FalsePositiveCall::LikelyRealThreat);
        // 0.5 + min(0.3, 6*0.05) + min(0.2, 4*0.04)
        assert_eq!(result.confidence, 0.96);
    }

    #[test]
    fn recurring_subject_false_positives_push_score_up() {
        let s = signal(SignalCategory::GeoAnomaly, json!({"endpoint": "/HEALTH"}));
        let history = vec![
            incident(1, "Acme Corp", true),
            incident(2, "Acme Corp", true),
            incident(3, "Acme Corp", true),
        ];
        let result = FalsePositiveScorer.score(&s, &opinions(0.7), &history);
        // 0.55 + (0.3 + 0.25 + 0.4) * 0.3
        assert_eq!(result.score, 0.835);
        assert_eq!(result.call, FalsePositiveCall::LikelyFalsePositive);
    }

    #[test]
    fn internal_ip_counts_when_no_health_endpoint() {
        let s = signal(SignalCategory::RateLimitBreach, json!({"source_ip": "10.1.2.3"}));
        let result = FalsePositiveScorer.score(&s, &IndexMap::new(), &[]);
        assert_eq!(result.indicators[0].kind, "source_ip");
        assert_eq!(result.score, 0.54);
    }
}
