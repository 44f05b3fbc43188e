//! Synthetic signal generation for demos, load and on-demand triggers.

use std::str::FromStr;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use warden_core::{Metadata, Signal, SignalCategory, WardenError};

use crate::reference::SUBJECTS;

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Safari/605.1.15",
    "Python-requests/2.31.0",
    "curl/7.68.0",
    "Suspicious-Bot/1.0",
    "Mozilla/5.0 (Linux; Android 10) Mobile Chrome/120.0.0.0",
];

const LOCATIONS: [(&str, f64, f64); 5] = [
    ("New York, US", 40.7128, -74.0060),
    ("London, UK", 51.5074, -0.1278),
    ("Tokyo, Japan", 35.6762, 139.6503),
    ("Sydney, Australia", -33.8688, 151.2093),
    ("Moscow, Russia", 55.7558, 37.6173),
];

/// Named, hand-shaped signals that exercise specific analysis paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    CryptoSurge,
    BotAttack,
    GeoImpossible,
    CriticalThreat,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::CryptoSurge,
        Scenario::BotAttack,
        Scenario::GeoImpossible,
        Scenario::CriticalThreat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::CryptoSurge => "crypto_surge",
            Scenario::BotAttack => "bot_attack",
            Scenario::GeoImpossible => "geo_impossible",
            Scenario::CriticalThreat => "critical_threat",
        }
    }
}

impl FromStr for Scenario {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.as_str() == s.trim())
            .ok_or_else(|| WardenError::UnknownScenario(s.to_string()))
    }
}

pub struct SignalGenerator {
    rng: Mutex<StdRng>,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut guard = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn random(&self) -> Signal {
        let category = self.with_rng(|rng| SignalCategory::ALL[rng.gen_range(0..SignalCategory::ALL.len())]);
        self.for_category(category)
    }

    pub fn for_category(&self, category: SignalCategory) -> Signal {
        let (subject, metadata) = self.with_rng(|rng| {
            let subject = pick(rng, &SUBJECTS);
            (subject, category_metadata(rng, category))
        });
        build(category, subject, metadata)
    }

    pub fn scenario(&self, scenario: Scenario) -> Signal {
        let (category, subject, metadata) = self.with_rng(|rng| scenario_signal(rng, scenario));
        build(category, subject, metadata)
    }
}

fn build(category: SignalCategory, subject: &str, metadata: serde_json::Value) -> Signal {
    let metadata: Metadata = match metadata {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    };
    // Generated subjects are never empty.
    Signal::new(category, subject, metadata.clone()).unwrap_or_else(|_| Signal {
        id: uuid::Uuid::new_v4(),
        category,
        subject: "unknown".to_string(),
        created_at: chrono::Utc::now(),
        metadata,
    })
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn random_ip(rng: &mut StdRng) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..=255),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(1..=255)
    )
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn location(name: &str, lat: f64, lon: f64, minutes_ago: i64) -> serde_json::Value {
    json!({
        "city": name,
        "latitude": lat,
        "longitude": lon,
        "timestamp": (chrono::Utc::now() - chrono::Duration::minutes(minutes_ago)).to_rfc3339(),
    })
}

fn category_metadata(rng: &mut StdRng, category: SignalCategory) -> serde_json::Value {
    match category {
        SignalCategory::BotTraffic => json!({
            "source_ip": random_ip(rng),
            "user_agent": "Suspicious-Bot/1.0",
            "request_count": rng.gen_range(500..=5000),
            "requests_per_second": rng.gen_range(50..=200),
            "endpoints_targeted": ["/api/login", "/api/checkout", "/api/account"],
            "detection_confidence": round2(rng.gen_range(0.85..0.99)),
            "behavioral_patterns": ["uniform_timing", "automated_retry_logic", "suspicious_user_agent"],
        }),
        SignalCategory::ProxyNetwork => {
            let count = rng.gen_range(5..=20);
            let proxies: Vec<String> = (0..count).map(|_| random_ip(rng)).collect();
            json!({
                "proxy_ips": proxies,
                "proxy_count": count,
                "user_agent": pick(rng, &USER_AGENTS),
                "shared_fingerprint": format!("fp_{}", rng.gen_range(10000..=99999)),
                "geographic_spread": ["US", "CA", "UK", "DE", "FR"],
                "detection_method": "device_fingerprint_correlation",
                "confidence_score": round2(rng.gen_range(0.75..0.95)),
            })
        }
        SignalCategory::DeviceCompromise => json!({
            "device_id": format!("device_{}", rng.gen_range(100000..=999999)),
            "source_ip": random_ip(rng),
            "user_agent": pick(rng, &USER_AGENTS),
            "compromise_indicators": ["rooted_device", "debugger_detected", "tampered_sdk"],
            "risk_score": round2(rng.gen_range(0.7..0.95)),
            "attempt_count": rng.gen_range(10..=100),
        }),
        SignalCategory::AnomalyDetection => json!({
            "user_id": format!("user_{}", rng.gen_range(1000..=9999)),
            "source_ip": random_ip(rng),
            "anomaly_score": round2(rng.gen_range(0.8..0.99)),
            "deviations": ["unusual_access_time", "atypical_location", "abnormal_request_pattern"],
            "baseline_comparison": {
                "typical_requests_per_hour": 50,
                "current_requests_per_hour": 500,
                "deviation_percentage": 900,
            },
        }),
        SignalCategory::RateLimitBreach => json!({
            "source_ip": random_ip(rng),
            "user_agent": pick(rng, &USER_AGENTS),
            "configured_limit": 100,
            "actual_rate": rng.gen_range(300..=1000),
            "breach_duration_seconds": rng.gen_range(30..=600),
            "endpoint": pick(rng, &["/api/search", "/api/data", "/api/login"]),
            "user_id": format!("user_{}", rng.gen_range(1000..=9999)),
            "breach_factor": (rng.gen_range(3.0..10.0_f64) * 10.0).round() / 10.0,
        }),
        SignalCategory::GeoAnomaly => {
            let picked: Vec<_> = LOCATIONS.choose_multiple(rng, 2).copied().collect();
            let (a, b) = (picked[0], picked[1]);
            json!({
                "user_id": format!("user_{}", rng.gen_range(1000..=9999)),
                "location_1": location(a.0, a.1, a.2, 5),
                "location_2": location(b.0, b.1, b.2, 0),
                "time_delta_minutes": 5,
                "distance_km": rng.gen_range(5000..=15000),
                "impossible_travel_detected": true,
                "confidence": round2(rng.gen_range(0.85..0.99)),
            })
        }
    }
}

fn scenario_signal(
    rng: &mut StdRng,
    scenario: Scenario,
) -> (SignalCategory, &'static str, serde_json::Value) {
    match scenario {
        Scenario::CryptoSurge => (
            SignalCategory::RateLimitBreach,
            "CryptoExchange Pro",
            json!({
                "source_ip": random_ip(rng),
                "user_agent": pick(rng, &USER_AGENTS),
                "configured_limit": 150,
                "actual_rate": 850,
                "breach_duration_seconds": 300,
                "endpoint": "/api/trade",
                "user_id": format!("user_{}", rng.gen_range(1000..=9999)),
                "breach_factor": 5.7,
                "context": "Bitcoin market volatility",
            }),
        ),
        Scenario::BotAttack => (
            SignalCategory::BotTraffic,
            "RetailMax",
            json!({
                "source_ip": random_ip(rng),
                "user_agent": "Suspicious-Bot/1.0",
                "request_count": 3500,
                "requests_per_second": 150,
                "endpoints_targeted": ["/api/checkout", "/api/inventory"],
                "detection_confidence": 0.97,
                "behavioral_patterns": ["uniform_timing", "automated_retry_logic"],
                "context": "Flash sale event",
            }),
        ),
        Scenario::GeoImpossible => (
            SignalCategory::GeoAnomaly,
            "Global Finance",
            json!({
                "user_id": format!("user_{}", rng.gen_range(1000..=9999)),
                "location_1": location("New York, US", 40.7128, -74.0060, 10),
                "location_2": location("Tokyo, Japan", 35.6762, 139.6503, 0),
                "time_delta_minutes": 10,
                "distance_km": 10850,
                "impossible_travel_detected": true,
                "confidence": 0.99,
            }),
        ),
        Scenario::CriticalThreat => (
            SignalCategory::DeviceCompromise,
            "HealthCare Plus",
            json!({
                "device_id": format!("device_{}", rng.gen_range(100000..=999999)),
                "source_ip": random_ip(rng),
                "user_agent": USER_AGENTS[0],
                "compromise_indicators": [
                    "unauthorized_admin_access",
                    "data_exfiltration_detected",
                    "malware_signature_match",
                    "lateral_movement_attempt",
                    "privilege_escalation",
                ],
                "severity_score": 9.8,
                "affected_systems": ["patient_records_db", "billing_system", "admin_portal"],
                "exfiltration_volume_mb": 2500,
                "c2_communication_detected": true,
                "requires_immediate_action": true,
                "context": "Active campaign targeting the healthcare sector",
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_parse() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.as_str().parse::<Scenario>().unwrap(), scenario);
        }
        assert!(matches!(
            "meteor_strike".parse::<Scenario>(),
            Err(WardenError::UnknownScenario(_))
        ));
    }

    #[test]
    fn category_generation_respects_category() {
        let generator = SignalGenerator::seeded(7);
        for category in SignalCategory::ALL {
            let signal = generator.for_category(category);
            assert_eq!(signal.category, category);
            assert!(SUBJECTS.contains(&signal.subject.as_str()));
            assert!(!signal.metadata.is_empty());
        }
    }

    #[test]
    fn critical_scenario_targets_healthcare() {
        let signal = SignalGenerator::seeded(1).scenario(Scenario::CriticalThreat);
        assert_eq!(signal.category, SignalCategory::DeviceCompromise);
        assert_eq!(signal.subject, "HealthCare Plus");
        assert_eq!(signal.meta_f64("severity_score"), Some(9.8));
    }

    #[test]
    fn seeded_generators_agree() {
        let a = SignalGenerator::seeded(42).random();
        let b = SignalGenerator::seeded(42).random();
        assert_eq!(a.category, b.category);
        assert_eq!(a.subject, b.subject);
    }
}
