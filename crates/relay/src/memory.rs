//! In-process stand-in for the shared service.
//!
//! Several [`SharedStore`](crate::SharedStore)s built on clones of one
//! `MemoryBackend` behave like instances sharing a Redis deployment. The
//! service can be switched off and on to exercise degraded mode.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use warden_core::Verdict;

use crate::error::RelayError;
use crate::local::LocalStore;
use crate::message::Message;
use crate::traits::{DurableBackend, EventPublisher, EventSubscriber, VerdictRepository};

const BUS_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

struct Inner {
    verdicts: LocalStore,
    bus: broadcast::Sender<Message>,
    reachable: watch::Sender<bool>,
}

impl MemoryBackend {
    pub fn new(max_retained: usize) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        let (reachable, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                verdicts: LocalStore::new(max_retained),
                bus,
                reachable,
            }),
        }
    }

    /// Simulate the service going away or coming back. Going away ends
    /// every open subscription.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.send_replace(reachable);
    }

    pub fn is_reachable(&self) -> bool {
        *self.inner.reachable.borrow()
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(RelayError::Unavailable("memory backend switched off".into()))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(warden_core::config::StoreConfig::default().max_retained)
    }
}

#[async_trait]
impl VerdictRepository for MemoryBackend {
    async fn ping(&self) -> Result<(), RelayError> {
        self.check()
    }

    async fn put(&self, verdict: &Verdict, retain: usize) -> Result<(), RelayError> {
        self.check()?;
        self.inner.verdicts.put_retaining(verdict, retain);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Verdict>, RelayError> {
        self.check()?;
        Ok(self.inner.verdicts.get(id))
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Verdict>, RelayError> {
        self.check()?;
        Ok(self.inner.verdicts.list(limit, offset))
    }

    async fn total_count(&self) -> Result<u64, RelayError> {
        self.check()?;
        Ok(self.inner.verdicts.total_count())
    }
}

#[async_trait]
impl EventPublisher for MemoryBackend {
    async fn publish(&self, message: Message) -> Result<(), RelayError> {
        self.check()?;
        // No subscribers is not an error: at-most-once delivery.
        let _ = self.inner.bus.send(message);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for MemoryBackend {
    async fn subscribe(&self) -> Result<BoxStream<'static, Message>, RelayError> {
        self.check()?;
        let rx = self.inner.bus.subscribe();
        let reachable = self.inner.reachable.subscribe();

        let stream = futures::stream::unfold((rx, reachable), |(mut rx, mut reachable)| async move {
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(message) => return Some((message, (rx, reachable))),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                    changed = reachable.changed() => {
                        if changed.is_err() || !*reachable.borrow() {
                            return None;
                        }
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}

impl DurableBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_support::verdict;
    use crate::message::BroadcastMessage;
    use std::time::Duration;

    #[tokio::test]
    async fn switched_off_backend_refuses_and_ends_streams() {
        let backend = MemoryBackend::new(10);
        let mut stream = backend.subscribe().await.unwrap();

        backend.set_reachable(false);
        assert!(backend.ping().await.is_err());
        assert!(backend.put(&verdict("x"), 10).await.is_err());

        let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn subscribers_see_published_messages() {
        let backend = MemoryBackend::new(10);
        let mut stream = backend.subscribe().await.unwrap();
        let msg = BroadcastMessage::NewVerdict(verdict("Acme Corp"))
            .to_message(Uuid::new_v4())
            .unwrap();
        backend.publish(msg.clone()).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.correlation_id, msg.correlation_id);
    }
}
