//! Response plan and investigation timeline attached to every verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signal::Metadata;
use crate::verdict::Severity;

// ── Response plan ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    BlockIp,
    RateLimit,
    Challenge,
    Whitelist,
    Monitor,
    Escalate,
    Quarantine,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::BlockIp => "block_ip",
            ActionKind::RateLimit => "rate_limit",
            ActionKind::Challenge => "challenge",
            ActionKind::Whitelist => "whitelist",
            ActionKind::Monitor => "monitor",
            ActionKind::Escalate => "escalate",
            ActionKind::Quarantine => "quarantine",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    Urgent,
    Normal,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Immediate => "immediate",
            Urgency::Urgent => "urgent",
            Urgency::Normal => "normal",
            Urgency::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// One recommended containment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAction {
    pub action_type: ActionKind,
    pub urgency: Urgency,
    /// IP, account or subject the action applies to.
    pub target: String,
    pub reason: String,
    pub confidence: f64,
    pub auto_executable: bool,
    pub requires_approval: bool,
    pub estimated_impact: Impact,
    pub rollback_possible: bool,
    pub parameters: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePlan {
    pub primary_action: ResponseAction,
    pub secondary_actions: Vec<ResponseAction>,
    /// Teams to involve, in order.
    pub escalation_path: Vec<String>,
    pub sla_minutes: u32,
    pub auto_escalate_after_minutes: u32,
    pub notes: String,
}

impl ResponsePlan {
    pub fn actions(&self) -> impl Iterator<Item = &ResponseAction> {
        std::iter::once(&self.primary_action).chain(self.secondary_actions.iter())
    }
}

// ── Investigation timeline ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    Detection,
    Enrichment,
    Analysis,
    Correlation,
    Decision,
    Action,
    Escalation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: TimelineEventKind,
    pub title: String,
    pub description: String,
    /// System or analyzer that produced the event.
    pub source: String,
    pub data: Metadata,
    pub severity: Option<Severity>,
}

/// Events ordered by timestamp, starting at signal creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationTimeline {
    pub events: Vec<TimelineEvent>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
}

impl InvestigationTimeline {
    pub fn count(&self, kind: TimelineEventKind) -> usize {
        self.events.iter().filter(|e| e.event_type == kind).count()
    }
}
