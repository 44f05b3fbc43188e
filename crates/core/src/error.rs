use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WardenError {
    #[error("unknown signal category: {0}")]
    UnknownCategory(String),

    #[error("signal subject must not be empty")]
    EmptySubject,

    #[error("signal metadata must be a JSON object")]
    InvalidMetadata,

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for WardenError {
    fn from(e: serde_json::Error) -> Self {
        WardenError::Serialize(e.to_string())
    }
}
