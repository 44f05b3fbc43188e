use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WardenError;

pub type SignalId = Uuid;

/// Open key-value bag carried alongside a signal.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Closed set of detection categories produced upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    BotTraffic,
    ProxyNetwork,
    DeviceCompromise,
    AnomalyDetection,
    RateLimitBreach,
    GeoAnomaly,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 6] = [
        SignalCategory::BotTraffic,
        SignalCategory::ProxyNetwork,
        SignalCategory::DeviceCompromise,
        SignalCategory::AnomalyDetection,
        SignalCategory::RateLimitBreach,
        SignalCategory::GeoAnomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::BotTraffic => "bot_traffic",
            SignalCategory::ProxyNetwork => "proxy_network",
            SignalCategory::DeviceCompromise => "device_compromise",
            SignalCategory::AnomalyDetection => "anomaly_detection",
            SignalCategory::RateLimitBreach => "rate_limit_breach",
            SignalCategory::GeoAnomaly => "geo_anomaly",
        }
    }

    /// Human-readable form used in summaries ("rate limit breach").
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Title-cased form used in timelines and plan notes ("Rate Limit Breach").
    pub fn title(&self) -> String {
        title_case(self.as_str())
    }
}

/// "block_ip" -> "Block Ip", "priority" -> "Priority".
pub fn title_case(s: &str) -> String {
    s.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalCategory {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| WardenError::UnknownCategory(s.to_string()))
    }
}

/// A single security event awaiting analysis. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub category: SignalCategory,
    /// Tenant the signal belongs to.
    pub subject: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Signal {
    /// Create a signal with a fresh id and the current timestamp.
    pub fn new(
        category: SignalCategory,
        subject: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Self, WardenError> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(WardenError::EmptySubject);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            category,
            subject: subject.trim().to_string(),
            created_at: Utc::now(),
            metadata,
        })
    }

    /// Validate untyped ingress input (category string, subject, JSON metadata).
    pub fn from_parts(
        category: &str,
        subject: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, WardenError> {
        let category = category.parse()?;
        let metadata = match metadata {
            None | Some(serde_json::Value::Null) => Metadata::new(),
            Some(serde_json::Value::Object(map)) => map,
            Some(_) => return Err(WardenError::InvalidMetadata),
        };
        Self::new(category, subject, metadata)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.as_f64())
    }

    pub fn meta_bool(&self, key: &str) -> bool {
        self.metadata.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// String entries of an array-valued metadata field.
    pub fn meta_list(&self, key: &str) -> Vec<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|i| i.as_str()).collect())
            .unwrap_or_default()
    }
}
