use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_core::Verdict;

/// Topic names carried on the broadcast channel.
pub mod topics {
    pub const NEW_VERDICT: &str = "verdict.new";
    pub const INITIAL_BATCH: &str = "verdict.initial_batch";
}

/// Wire envelope published on the broadcast channel.
///
/// Serialized with MessagePack. `origin` names the publishing instance so a
/// store can recognise its own messages echoed back by the shared service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,

    /// MessagePack-encoded payload bytes.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    pub timestamp: DateTime<Utc>,

    pub correlation_id: Uuid,

    pub origin: Uuid,

    /// Schema version; consumers check this before decoding the payload.
    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_version() -> u16 {
    1
}

impl Message {
    pub fn new<T: Serialize>(
        topic: impl Into<String>,
        payload: &T,
        origin: Uuid,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: rmp_serde::to_vec(payload)?,
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            origin,
            version: 1,
        })
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.payload)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Payload of a broadcast message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BroadcastMessage {
    NewVerdict(Verdict),
    InitialBatch(Vec<Verdict>),
}

impl BroadcastMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            BroadcastMessage::NewVerdict(_) => topics::NEW_VERDICT,
            BroadcastMessage::InitialBatch(_) => topics::INITIAL_BATCH,
        }
    }

    /// Client-facing frame type.
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcastMessage::NewVerdict(_) => "new_verdict",
            BroadcastMessage::InitialBatch(_) => "initial_batch",
        }
    }

    pub fn to_message(&self, origin: Uuid) -> Result<Message, rmp_serde::encode::Error> {
        Message::new(self.topic(), self, origin)
    }

    pub fn from_message(message: &Message) -> Result<Self, rmp_serde::decode::Error> {
        message.decode()
    }
}

/// Serde helper so `Vec<u8>` is written as a MessagePack bin, not an array.
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use indexmap::IndexMap;
    use uuid::Uuid;
    use warden_core::{Metadata, Opinion, Severity, Signal, SignalCategory, Verdict};

    pub fn verdict(subject: &str) -> Verdict {
        let mut metadata = Metadata::new();
        metadata.insert("source_ip".into(), serde_json::json!("203.0.113.7"));
        let signal = Signal::new(SignalCategory::ProxyNetwork, subject, metadata).unwrap();
        let mut opinions = IndexMap::new();
        opinions.insert(
            "priority".to_string(),
            Opinion::new("priority", "Severity assessed as HIGH", 0.7).with_findings(["f"]),
        );
        Verdict {
            id: Uuid::new_v4(),
            signal,
            severity: Severity::High,
            summary: format!("HIGH severity proxy network detected for {subject}."),
            opinions,
            total_elapsed_ms: 12,
            needs_review: false,
            review_reason: None,
            false_positive: None,
            response_plan: None,
            investigation_timeline: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_survives_the_envelope() {
        let verdict = test_support::verdict("Acme Corp");
        let origin = Uuid::new_v4();
        let msg = BroadcastMessage::NewVerdict(verdict.clone())
            .to_message(origin)
            .unwrap();
        assert_eq!(msg.topic, topics::NEW_VERDICT);

        let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.origin, origin);
        assert_eq!(
            BroadcastMessage::from_message(&decoded).unwrap(),
            BroadcastMessage::NewVerdict(verdict)
        );
    }

    #[test]
    fn garbage_payload_is_rejected() {
        let mut msg = BroadcastMessage::InitialBatch(Vec::new())
            .to_message(Uuid::new_v4())
            .unwrap();
        msg.payload = vec![0xc1];
        assert!(BroadcastMessage::from_message(&msg).is_err());
    }
}
