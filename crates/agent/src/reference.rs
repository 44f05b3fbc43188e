//! Read-only reference lookups used to build analyzer context.
//!
//! `StaticReference` is a fixed in-process catalogue: incident history,
//! per-subject policy, recent infrastructure changes and industry news.
//! Timestamps are anchored to construction time so "recent" windows stay meaningful.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use warden_core::SignalCategory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub subject: String,
    pub category: SignalCategory,
    pub occurred_at: DateTime<Utc>,
    pub resolution: String,
    pub was_false_positive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectPolicy {
    pub subject: String,
    pub rate_limit_per_minute: u32,
    /// ISO country codes the subject blocks.
    pub geo_restrictions: Vec<String>,
    pub bot_sensitivity: Sensitivity,
    /// Lets block actions run without analyst approval.
    #[serde(default)]
    pub auto_block_enabled: bool,
    /// Subject-side contacts appended to the escalation path.
    #[serde(default)]
    pub escalation_contacts: Vec<String>,
}

impl SubjectPolicy {
    /// Policy applied to subjects without an explicit entry.
    pub fn fallback(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            rate_limit_per_minute: 100,
            geo_restrictions: Vec::new(),
            bot_sensitivity: Sensitivity::Medium,
            auto_block_enabled: false,
            escalation_contacts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraEvent {
    pub id: String,
    /// deployment, scaling, outage, maintenance
    pub kind: String,
    pub occurred_at: DateTime<Utc>,
    pub description: String,
    pub affected_services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

/// Source of reference data, keyed by category and subject.
pub trait ReferenceSource: Send + Sync {
    /// Incidents sharing the category or the subject, most recent first.
    fn similar_incidents(&self, category: SignalCategory, subject: &str, limit: usize) -> Vec<Incident>;

    fn subject_policy(&self, subject: &str) -> SubjectPolicy;

    /// Infrastructure events newer than `window`, most recent first.
    fn recent_infra_events(&self, window: Duration, limit: usize) -> Vec<InfraEvent>;

    /// News whose title or summary mentions any keyword (case-insensitive).
    fn relevant_news(&self, keywords: &[String], limit: usize) -> Vec<NewsItem>;
}

pub const SUBJECTS: [&str; 8] = [
    "Acme Corp",
    "TechStart Inc",
    "Global Finance",
    "HealthCare Plus",
    "RetailMax",
    "CryptoExchange Pro",
    "EduPlatform",
    "SocialNet Co",
];

const RESOLUTIONS: [&str; 6] = [
    "Confirmed attack - blocked IP ranges",
    "False positive - product launch traffic",
    "Configuration updated - rate limits adjusted",
    "User behavior confirmed legitimate",
    "Credential stuffing attack mitigated",
    "Bot traffic blocked at edge",
];

#[derive(Debug, Clone)]
pub struct StaticReference {
    incidents: Vec<Incident>,
    policies: Vec<SubjectPolicy>,
    infra_events: Vec<InfraEvent>,
    news: Vec<NewsItem>,
}

impl Default for StaticReference {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticReference {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(now: DateTime<Utc>) -> Self {
        Self {
            incidents: build_incidents(now),
            policies: build_policies(),
            infra_events: build_infra_events(now),
            news: build_news(now),
        }
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }
}

fn build_incidents(now: DateTime<Utc>) -> Vec<Incident> {
    let mut incidents: Vec<Incident> = (0..30usize)
        .map(|i| Incident {
            id: format!("incident_{}", i + 1),
            subject: SUBJECTS[i % 6].to_string(),
            category: SignalCategory::ALL[(i * 5) % 6],
            occurred_at: now - Duration::days(1 + ((i * 7) % 30) as i64),
            resolution: RESOLUTIONS[(i * 2 + 1) % RESOLUTIONS.len()].to_string(),
            was_false_positive: i % 3 == 1,
        })
        .collect();
    incidents.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    incidents
}

fn build_policies() -> Vec<SubjectPolicy> {
    let table: [(&str, u32, &[&str], Sensitivity); 8] = [
        ("Acme Corp", 100, &["RU", "CN", "KP"], Sensitivity::Medium),
        ("TechStart Inc", 200, &["KP"], Sensitivity::Low),
        ("Global Finance", 50, &["RU", "CN", "KP", "IR"], Sensitivity::High),
        ("HealthCare Plus", 75, &["KP"], Sensitivity::Medium),
        ("RetailMax", 500, &[], Sensitivity::Low),
        ("CryptoExchange Pro", 150, &["KP", "IR"], Sensitivity::High),
        ("EduPlatform", 300, &[], Sensitivity::Low),
        ("SocialNet Co", 250, &["KP"], Sensitivity::Medium),
    ];
    table
        .into_iter()
        .map(|(subject, rate, geo, sensitivity)| SubjectPolicy {
            subject: subject.to_string(),
            rate_limit_per_minute: rate,
            geo_restrictions: geo.iter().map(|c| c.to_string()).collect(),
            bot_sensitivity: sensitivity,
            auto_block_enabled: false,
            escalation_contacts: Vec::new(),
        })
        .collect()
}

fn build_infra_events(now: DateTime<Utc>) -> Vec<InfraEvent> {
    let table: [(&str, &str, &[&str], i64); 6] = [
        ("deployment", "Production deployment of API v2.3.1", &["api-gateway", "auth-service"], 15),
        ("scaling", "Auto-scaling triggered for traffic surge", &["api-gateway"], 45),
        ("outage", "Brief network connectivity issue in us-east-1", &["all-services"], 90),
        ("deployment", "Security patch applied to edge servers", &["edge-proxy"], 30),
        ("scaling", "Database read replicas scaled up", &["db-cluster"], 120),
        ("maintenance", "Scheduled maintenance on logging infrastructure", &["logging"], 10),
    ];
    table
        .into_iter()
        .enumerate()
        .map(|(i, (kind, description, services, minutes_ago))| InfraEvent {
            id: format!("infra_{}", i + 1),
            kind: kind.to_string(),
            occurred_at: now - Duration::minutes(minutes_ago),
            description: description.to_string(),
            affected_services: services.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

fn build_news(now: DateTime<Utc>) -> Vec<NewsItem> {
    let table: [(&str, &str, &str, i64); 5] = [
        (
            "Bitcoin drops 8% amid market uncertainty",
            "Cryptocurrency markets experience significant volatility as Bitcoin falls sharply.",
            "CryptoNews",
            2,
        ),
        (
            "Major retailer announces flash sale event",
            "RetailMax competitor launches surprise 24-hour sale, expecting traffic surge.",
            "RetailWeekly",
            5,
        ),
        (
            "New credential stuffing toolkit released on dark web",
            "Security researchers identify new automated bot traffic toolkit targeting financial services.",
            "SecurityWeek",
            8,
        ),
        (
            "Healthcare data breach reported at competitor",
            "Major healthcare provider reports device compromise affecting millions of records.",
            "HealthIT News",
            12,
        ),
        (
            "Social media platform experiences global outage",
            "Competing social network down for 2 hours, users migrating to alternatives.",
            "TechCrunch",
            20,
        ),
    ];
    table
        .into_iter()
        .enumerate()
        .map(|(i, (title, summary, source, hours_ago))| NewsItem {
            id: format!("news_{}", i + 1),
            title: title.to_string(),
            summary: summary.to_string(),
            source: source.to_string(),
            published_at: now - Duration::hours(hours_ago),
        })
        .collect()
}

impl ReferenceSource for StaticReference {
    fn similar_incidents(&self, category: SignalCategory, subject: &str, limit: usize) -> Vec<Incident> {
        self.incidents
            .iter()
            .filter(|i| i.category == category || i.subject == subject)
            .take(limit)
            .cloned()
            .collect()
    }

    fn subject_policy(&self, subject: &str) -> SubjectPolicy {
        self.policies
            .iter()
            .find(|p| p.subject == subject)
            .cloned()
            .unwrap_or_else(|| SubjectPolicy::fallback(subject))
    }

    fn recent_infra_events(&self, window: Duration, limit: usize) -> Vec<InfraEvent> {
        let cutoff = Utc::now() - window;
        let mut events: Vec<InfraEvent> = self
            .infra_events
            .iter()
            .filter(|e| e.occurred_at > cutoff)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit);
        events
    }

    fn relevant_news(&self, keywords: &[String], limit: usize) -> Vec<NewsItem> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self.news
            .iter()
            .filter(|item| {
                let title = item.title.to_lowercase();
                let summary = item.summary.to_lowercase();
                keywords.iter().any(|k| title.contains(k) || summary.contains(k))
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similar_incidents_match_category_or_subject() {
        let reference = StaticReference::new();
        let found = reference.similar_incidents(SignalCategory::BotTraffic, "RetailMax", 5);
        assert!(found.len() <= 5);
        assert!(!found.is_empty());
        assert!(found
            .iter()
            .all(|i| i.category == SignalCategory::BotTraffic || i.subject == "RetailMax"));
        assert!(found.windows(2).all(|w| w[0].occurred_at >= w[1].occurred_at));
    }

    #[test]
    fn unknown_subject_gets_fallback_policy() {
        let reference = StaticReference::new();
        let policy = reference.subject_policy("Nobody Ltd");
        assert_eq!(policy.rate_limit_per_minute, 100);
        assert!(policy.geo_restrictions.is_empty());
        assert_eq!(policy.bot_sensitivity, Sensitivity::Medium);

        assert_eq!(reference.subject_policy("Global Finance").rate_limit_per_minute, 50);
    }

    #[test]
    fn infra_window_excludes_old_events() {
        let reference = StaticReference::new();
        let recent = reference.recent_infra_events(Duration::minutes(60), 10);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].kind, "maintenance");
    }

    #[test]
    fn news_matches_keywords_case_insensitively() {
        let reference = StaticReference::new();
        let news = reference.relevant_news(&["BITCOIN".to_string()], 3);
        assert_eq!(news.len(), 1);
        assert!(news[0].title.starts_with("Bitcoin"));

        assert!(reference.relevant_news(&[" ".to_string()], 3).is_empty());
    }
}
