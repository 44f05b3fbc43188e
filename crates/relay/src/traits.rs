use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use warden_core::Verdict;

use crate::error::RelayError;
use crate::message::Message;

/// Verdict persistence with an ordered newest-first index.
#[async_trait]
pub trait VerdictRepository: Send + Sync {
    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), RelayError>;

    /// Store a verdict and trim the index to `retain` entries, deleting
    /// the evicted verdicts as well.
    async fn put(&self, verdict: &Verdict, retain: usize) -> Result<(), RelayError>;

    async fn get(&self, id: Uuid) -> Result<Option<Verdict>, RelayError>;

    /// Page of verdicts, newest first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Verdict>, RelayError>;

    /// Distinct verdicts ever stored, including evicted ones. Re-putting a
    /// retained id does not count again.
    async fn total_count(&self) -> Result<u64, RelayError>;
}

/// Publishes messages on the broadcast channel.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), RelayError>;
}

/// Blanket implementation so `Arc<dyn EventPublisher>` can be used directly.
#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: Message) -> Result<(), RelayError> {
        (**self).publish(message).await
    }
}

/// Opens a subscription to the broadcast channel.
///
/// The returned stream ends when the connection drops; callers resubscribe.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self) -> Result<BoxStream<'static, Message>, RelayError>;
}

/// A shared service that provides both persistence and broadcast.
pub trait DurableBackend: VerdictRepository + EventPublisher + EventSubscriber {
    /// Short label for logs and metrics.
    fn kind(&self) -> &'static str;
}
