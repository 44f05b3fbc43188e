pub mod error;
pub mod local;
pub mod memory;
pub mod message;
pub mod metrics;
#[cfg(feature = "redis")]
pub mod redis_backend;
pub mod store;
pub mod traits;

pub use error::RelayError;
pub use local::LocalStore;
pub use memory::MemoryBackend;
pub use message::{topics, BroadcastMessage, Message};
pub use metrics::{MetricsCollector, MetricsResponse};
#[cfg(feature = "redis")]
pub use redis_backend::RedisBackend;
pub use store::{SharedStore, StoreMode};
pub use traits::{DurableBackend, EventPublisher, EventSubscriber, VerdictRepository};
