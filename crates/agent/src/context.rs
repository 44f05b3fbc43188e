use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use warden_core::Signal;

use crate::analyzer::{AnalyzerRegistry, ContextNeed};
use crate::reference::{Incident, InfraEvent, NewsItem, ReferenceSource, SubjectPolicy};

pub const SIMILAR_INCIDENT_LIMIT: usize = 5;
pub const INFRA_EVENT_LIMIT: usize = 5;
pub const NEWS_LIMIT: usize = 3;
pub const INFRA_WINDOW_MINUTES: i64 = 60;

/// Reference data handed to a single analyzer. Any part may be empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzerContext {
    pub similar_incidents: Vec<Incident>,
    pub subject_policy: Option<SubjectPolicy>,
    pub infra_events: Vec<InfraEvent>,
    pub news: Vec<NewsItem>,
}

impl AnalyzerContext {
    pub fn is_empty(&self) -> bool {
        self.similar_incidents.is_empty()
            && self.subject_policy.is_none()
            && self.infra_events.is_empty()
            && self.news.is_empty()
    }
}

/// Analyzer name -> context entry.
pub type ContextMap = HashMap<String, AnalyzerContext>;

/// Incidents across every entry of a context map, without duplicates.
pub fn collect_incidents(contexts: &ContextMap) -> Vec<Incident> {
    let mut seen = std::collections::HashSet::new();
    let mut incidents = Vec::new();
    for ctx in contexts.values() {
        for incident in &ctx.similar_incidents {
            if seen.insert(incident.id.clone()) {
                incidents.push(incident.clone());
            }
        }
    }
    incidents
}

/// The subject policy carried by any entry of a context map.
pub fn find_subject_policy(contexts: &ContextMap) -> Option<&SubjectPolicy> {
    contexts.values().find_map(|ctx| ctx.subject_policy.as_ref())
}

/// Builds one context entry per registered analyzer from a reference source.
#[derive(Clone)]
pub struct ContextAssembler {
    source: Arc<dyn ReferenceSource>,
}

impl ContextAssembler {
    pub fn new(source: Arc<dyn ReferenceSource>) -> Self {
        Self { source }
    }

    pub fn assemble(&self, signal: &Signal, registry: &AnalyzerRegistry) -> ContextMap {
        let mut contexts = ContextMap::with_capacity(registry.len());
        for analyzer in registry.iter() {
            let mut ctx = AnalyzerContext::default();
            for need in analyzer.needs() {
                match need {
                    ContextNeed::SimilarIncidents => {
                        ctx.similar_incidents = self.source.similar_incidents(
                            signal.category,
                            &signal.subject,
                            SIMILAR_INCIDENT_LIMIT,
                        );
                    }
                    ContextNeed::SubjectPolicy => {
                        ctx.subject_policy = Some(self.source.subject_policy(&signal.subject));
                    }
                    ContextNeed::InfraEvents => {
                        ctx.infra_events = self.source.recent_infra_events(
                            chrono::Duration::minutes(INFRA_WINDOW_MINUTES),
                            INFRA_EVENT_LIMIT,
                        );
                    }
                    ContextNeed::News => {
                        ctx.news = self.source.relevant_news(&news_keywords(signal), NEWS_LIMIT);
                    }
                }
            }
            debug!(
                analyzer = analyzer.name(),
                incidents = ctx.similar_incidents.len(),
                infra_events = ctx.infra_events.len(),
                news = ctx.news.len(),
                "context assembled"
            );
            contexts.insert(analyzer.name().to_string(), ctx);
        }
        contexts
    }
}

/// Subject, category words, and market terms tied to the subject's sector.
fn news_keywords(signal: &Signal) -> Vec<String> {
    let mut keywords = vec![signal.subject.clone(), signal.category.label()];
    let subject = signal.subject.to_lowercase();
    if subject.contains("crypto") {
        keywords.push("bitcoin".to_string());
    }
    if subject.contains("health") {
        keywords.push("healthcare".to_string());
    }
    keywords
}
