//! Response planning.
//!
//! Picks containment actions from a per-category, per-severity template,
//! then layers subject policy and the escalation chain on top. A likely
//! false positive short-circuits to a single low-urgency monitor action.

use indexmap::IndexMap;
use serde_json::json;
use tracing::debug;

use warden_core::{
    ActionKind, FalsePositiveScore, Impact, Metadata, Opinion, ResponseAction, ResponsePlan,
    Severity, Signal, SignalCategory, Urgency,
};

use crate::reference::SubjectPolicy;

/// False-positive score at or above which only monitoring is proposed.
pub const FALSE_POSITIVE_CUTOFF: f64 = 0.7;
/// Subject contacts appended to an escalation path.
const MAX_SUBJECT_CONTACTS: usize = 2;
const UNKNOWN_IP: &str = "0.0.0.0";

use ActionKind::*;
use Urgency::*;

fn template(category: SignalCategory, severity: Severity) -> &'static [(ActionKind, Urgency)] {
    match (category, severity) {
        (SignalCategory::BotTraffic, Severity::Critical) => &[(BlockIp, Immediate), (RateLimit, Immediate)],
        (SignalCategory::BotTraffic, Severity::High) => &[(RateLimit, Urgent), (Challenge, Urgent)],
        (SignalCategory::BotTraffic, Severity::Medium) => &[(Challenge, Normal), (Monitor, Normal)],

        (SignalCategory::ProxyNetwork, Severity::Critical) => &[(BlockIp, Immediate), (Escalate, Immediate)],
        (SignalCategory::ProxyNetwork, Severity::High) => &[(BlockIp, Urgent), (Challenge, Urgent)],
        (SignalCategory::ProxyNetwork, Severity::Medium) => &[(Challenge, Normal), (RateLimit, Normal)],
        (SignalCategory::ProxyNetwork, Severity::Low) => &[(Monitor, Normal)],

        (SignalCategory::DeviceCompromise, Severity::Critical) => {
            &[(Quarantine, Immediate), (Escalate, Immediate), (BlockIp, Immediate)]
        }
        (SignalCategory::DeviceCompromise, Severity::High) => &[(Quarantine, Urgent), (Challenge, Urgent)],
        (SignalCategory::DeviceCompromise, Severity::Medium) => &[(Challenge, Normal), (Monitor, Normal)],

        (SignalCategory::RateLimitBreach, Severity::Critical) => &[(RateLimit, Immediate), (BlockIp, Urgent)],
        (SignalCategory::RateLimitBreach, Severity::High) => &[(RateLimit, Urgent)],
        (SignalCategory::RateLimitBreach, Severity::Medium) => &[(RateLimit, Normal)],

        (SignalCategory::GeoAnomaly, Severity::Critical) => &[(Challenge, Immediate), (Escalate, Urgent)],
        (SignalCategory::GeoAnomaly, Severity::High) => &[(Challenge, Urgent)],
        (SignalCategory::GeoAnomaly, Severity::Medium) => &[(Challenge, Normal)],

        (SignalCategory::AnomalyDetection, _) => &[(Monitor, Normal)],
        (_, Severity::Low) => &[(Monitor, Low)],
    }
}

pub fn sla_minutes(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 15,
        Severity::High => 30,
        Severity::Medium => 60,
        Severity::Low => 240,
    }
}

fn escalation_path(severity: Severity) -> Vec<String> {
    let path: &[&str] = match severity {
        Severity::Critical => &["SOC Tier 2", "SOC Manager", "CISO", "Customer Success"],
        Severity::High => &["SOC Tier 2", "SOC Manager", "Customer Success"],
        Severity::Medium => &["SOC Tier 1", "SOC Tier 2"],
        Severity::Low => &["SOC Tier 1"],
    };
    path.iter().map(|s| s.to_string()).collect()
}

fn params(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponsePlanner;

impl ResponsePlanner {
    pub fn plan(
        &self,
        signal: &Signal,
        severity: Severity,
        fp: &FalsePositiveScore,
        policy: Option<&SubjectPolicy>,
        opinions: &IndexMap<String, Opinion>,
    ) -> ResponsePlan {
        if fp.score >= FALSE_POSITIVE_CUTOFF {
            debug!(signal_id = %signal.id, score = fp.score, "likely false positive; monitor only");
            return false_positive_plan(signal, fp);
        }

        let mut actions: Vec<ResponseAction> = template(signal.category, severity)
            .iter()
            .map(|(kind, urgency)| build_action(*kind, *urgency, signal, severity))
            .collect();

        if policy.is_some_and(|p| p.auto_block_enabled) {
            for action in actions.iter_mut().filter(|a| a.action_type == BlockIp) {
                action.auto_executable = true;
                action.requires_approval = false;
            }
        }

        let mut escalation = escalation_path(severity);
        if let Some(policy) = policy {
            escalation.extend(policy.escalation_contacts.iter().take(MAX_SUBJECT_CONTACTS).cloned());
        }

        let sla = sla_minutes(severity);
        let mut actions = actions.into_iter();
        let primary_action = actions.next().unwrap_or_else(|| default_monitor(signal));

        let plan = ResponsePlan {
            primary_action,
            secondary_actions: actions.collect(),
            escalation_path: escalation,
            sla_minutes: sla,
            auto_escalate_after_minutes: sla / 2,
            notes: notes(signal, severity, opinions),
        };
        debug!(
            signal_id = %signal.id,
            primary = %plan.primary_action.action_type,
            urgency = plan.primary_action.urgency.as_str(),
            sla_minutes = sla,
            "response plan built"
        );
        plan
    }
}

fn source_ip(signal: &Signal) -> String {
    signal.meta_str("source_ip").unwrap_or(UNKNOWN_IP).to_string()
}

fn false_positive_plan(signal: &Signal, fp: &FalsePositiveScore) -> ResponsePlan {
    ResponsePlan {
        primary_action: ResponseAction {
            action_type: Monitor,
            urgency: Low,
            target: source_ip(signal),
            reason: format!("Likely false positive (score: {:.2})", fp.score),
            confidence: fp.confidence,
            auto_executable: true,
            requires_approval: false,
            estimated_impact: Impact::Low,
            rollback_possible: true,
            parameters: params(json!({"duration_minutes": 30})),
        },
        secondary_actions: Vec::new(),
        escalation_path: vec!["SOC Tier 1".to_string()],
        sla_minutes: sla_minutes(Severity::Low),
        auto_escalate_after_minutes: sla_minutes(Severity::Low) / 2,
        notes: format!("High false positive likelihood. {}", fp.explanation),
    }
}

fn default_monitor(signal: &Signal) -> ResponseAction {
    ResponseAction {
        action_type: Monitor,
        urgency: Normal,
        target: source_ip(signal),
        reason: "Standard monitoring".to_string(),
        confidence: 0.5,
        auto_executable: true,
        requires_approval: false,
        estimated_impact: Impact::Low,
        rollback_possible: true,
        parameters: params(json!({"duration_minutes": 60})),
    }
}

fn build_action(kind: ActionKind, urgency: Urgency, signal: &Signal, severity: Severity) -> ResponseAction {
    let category = signal.category.as_str();
    let severe = severity >= Severity::High;
    let (reason, impact, parameters, auto_exec) = match kind {
        BlockIp => (
            format!("Block malicious IP due to {category}"),
            if severe { Impact::High } else { Impact::Medium },
            json!({"duration_minutes": 60, "scope": "subject"}),
            false,
        ),
        RateLimit => (
            format!("Apply rate limiting due to {category}"),
            Impact::Medium,
            json!({"requests_per_minute": 10, "duration_minutes": 30}),
            true,
        ),
        Challenge => (
            format!("Require CAPTCHA/challenge due to {category}"),
            Impact::Low,
            json!({"challenge_type": "captcha", "duration_minutes": 60}),
            true,
        ),
        Whitelist => (
            "Add to whitelist - confirmed legitimate traffic".to_string(),
            Impact::Low,
            json!({"duration_minutes": 1440}),
            false,
        ),
        Monitor => (
            format!("Enhanced monitoring for {category}"),
            Impact::Low,
            json!({"duration_minutes": 60, "alert_threshold": 100}),
            true,
        ),
        Escalate => (
            format!("Escalate {severity} {category} for review"),
            Impact::Low,
            json!({"escalation_level": "Tier 2"}),
            true,
        ),
        Quarantine => (
            format!("Quarantine affected account due to {category}"),
            Impact::High,
            json!({"notify_user": true}),
            false,
        ),
    };

    let target = match kind {
        BlockIp | RateLimit | Challenge | Monitor => source_ip(signal),
        Quarantine => signal.meta_str("user_id").unwrap_or(&signal.subject).to_string(),
        Whitelist | Escalate => signal.subject.clone(),
    };

    ResponseAction {
        action_type: kind,
        urgency,
        target,
        reason,
        confidence: if severe { 0.8 } else { 0.6 },
        auto_executable: auto_exec,
        requires_approval: !auto_exec,
        estimated_impact: impact,
        rollback_possible: true,
        parameters: params(parameters),
    }
}

/// "Threat: Bot Traffic | Severity: HIGH | Subject: Acme Corp | Historical: ..."
fn notes(signal: &Signal, severity: Severity, opinions: &IndexMap<String, Opinion>) -> String {
    let mut parts = vec![
        format!("Threat: {}", signal.category.title()),
        format!("Severity: {severity}"),
        format!("Subject: {}", signal.subject),
    ];
    for (name, opinion) in opinions {
        if let Some(first) = opinion.findings.first() {
            parts.push(format!("{}: {first}", warden_core::title_case(name)));
        }
    }
    parts.join(" | ")
}
