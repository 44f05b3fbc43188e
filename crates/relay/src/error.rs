use thiserror::Error;

/// Errors raised by durable backends.
///
/// The [`SharedStore`](crate::SharedStore) absorbs these by switching to
/// degraded mode; they only surface from the backend traits directly.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[cfg(feature = "redis")]
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("shared service unavailable: {0}")]
    Unavailable(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
