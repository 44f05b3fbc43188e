//! Per-instance registry of connected real-time clients.
//!
//! Each session owns a bounded outbound queue drained by its own writer task,
//! so a slow client only ever loses its own messages.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_core::config::SessionConfig;
use warden_relay::{BroadcastMessage, SharedStore};

use crate::live::broadcast_frame;

pub type SessionId = Uuid;

struct SessionHandle {
    tx: mpsc::Sender<String>,
    last_seen: Instant,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a session and queue its initial snapshot ahead of any live message.
    pub async fn register(&self, store: &SharedStore) -> (SessionId, mpsc::Receiver<String>) {
        let snapshot = store.list(self.config.snapshot_size, 0).await;
        let (tx, rx) = mpsc::channel(self.config.send_buffer.max(1));
        let id = Uuid::new_v4();

        let count = snapshot.len();
        // Fresh channel with capacity >= 1: cannot be full.
        let _ = tx.try_send(broadcast_frame(&BroadcastMessage::InitialBatch(snapshot)));

        let mut sessions = self.lock();
        sessions.insert(
            id,
            SessionHandle {
                tx,
                last_seen: Instant::now(),
            },
        );
        info!(session = %id, snapshot = count, sessions = sessions.len(), "session registered");
        (id, rx)
    }

    /// Push a broadcast to every session. Returns how many accepted it.
    pub fn deliver(&self, message: &BroadcastMessage) -> usize {
        let frame = broadcast_frame(message);
        let mut sessions = self.lock();
        let mut delivered = 0;
        let mut gone = Vec::new();

        for (id, handle) in sessions.iter() {
            match handle.tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(session = %id, "session queue full; dropping message for this session")
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            sessions.remove(&id);
            debug!(session = %id, "session closed; unregistered during delivery");
        }
        delivered
    }

    /// Queue a frame for one session. False when the session is gone.
    pub fn send_to(&self, id: SessionId, frame: String) -> bool {
        let mut sessions = self.lock();
        let Some(handle) = sessions.get(&id) else {
            return false;
        };
        match handle.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => {
                sessions.remove(&id);
                false
            }
        }
    }

    pub fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.lock();
        let removed = sessions.remove(&id).is_some();
        if removed {
            info!(session = %id, sessions = sessions.len(), "session unregistered");
        }
        removed
    }

    /// Record client activity.
    pub fn touch(&self, id: SessionId) {
        if let Some(handle) = self.lock().get_mut(&id) {
            handle.last_seen = Instant::now();
        }
    }

    /// Drop sessions silent for longer than the idle timeout. Dropping the
    /// queue sender ends the session's writer task, which closes the socket.
    pub fn reap_idle(&self) -> Vec<SessionId> {
        let idle = self.config.idle_timeout();
        let mut sessions = self.lock();
        let stale: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, h)| h.last_seen.elapsed() > idle)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            sessions.remove(id);
            info!(session = %id, "idle session reaped");
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_agent::SignalGenerator;
    use warden_core::config::StoreConfig;
    use warden_core::Verdict;

    fn registry(buffer: usize) -> SessionRegistry {
        SessionRegistry::new(SessionConfig {
            send_buffer: buffer,
            ..SessionConfig::default()
        })
    }

    fn frame_type(frame: &str) -> String {
        let v: serde_json::Value = serde_json::from_str(frame).unwrap();
        v["type"].as_str().unwrap().to_string()
    }

    async fn stored_verdict(store: &SharedStore) -> Verdict {
        let coordinator = warden_agent::Coordinator::new(
            std::sync::Arc::new(warden_agent::AnalyzerRegistry::builtin()),
            &Default::default(),
        );
        let signal = SignalGenerator::seeded(7).random();
        let verdict = coordinator.run(&signal, &Default::default()).await;
        store.put(&verdict).await;
        verdict
    }

    #[tokio::test]
    async fn register_sends_snapshot_first() {
        let store = SharedStore::local_only(StoreConfig::default()).await;
        let verdict = stored_verdict(&store).await;
        let sessions = registry(8);

        let (_, mut rx) = sessions.register(&store).await;
        let first = rx.recv().await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(v["type"], "initial_batch");
        assert_eq!(v["data"][0]["id"], verdict.id.to_string());
        assert!(v["timestamp"].is_string());
    }

    #[tokio::test]
    async fn failed_send_removes_only_that_session() {
        let store = SharedStore::local_only(StoreConfig::default()).await;
        let verdict = stored_verdict(&store).await;
        let sessions = registry(8);

        let (_, mut alive) = sessions.register(&store).await;
        let (_, dropped) = sessions.register(&store).await;
        drop(dropped);
        assert_eq!(sessions.len(), 2);

        let delivered = sessions.deliver(&BroadcastMessage::NewVerdict(verdict));
        assert_eq!(delivered, 1);
        assert_eq!(sessions.len(), 1);

        assert_eq!(frame_type(&alive.recv().await.unwrap()), "initial_batch");
        assert_eq!(frame_type(&alive.recv().await.unwrap()), "new_verdict");
    }

    #[tokio::test]
    async fn full_queue_drops_for_that_session_only() {
        let store = SharedStore::local_only(StoreConfig::default()).await;
        let verdict = stored_verdict(&store).await;
        let sessions = registry(1);

        // Snapshot fills the single slot; nothing drains it.
        let (_, _stuck) = sessions.register(&store).await;
        let delivered = sessions.deliver(&BroadcastMessage::NewVerdict(verdict));
        assert_eq!(delivered, 0);
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_reaped() {
        let store = SharedStore::local_only(StoreConfig::default()).await;
        let sessions = SessionRegistry::new(SessionConfig {
            idle_timeout_secs: 1,
            ..SessionConfig::default()
        });
        let (quiet, _rx1) = sessions.register(&store).await;
        let (chatty, _rx2) = sessions.register(&store).await;

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        sessions.touch(chatty);

        assert_eq!(sessions.reap_idle(), vec![quiet]);
        assert_eq!(sessions.len(), 1);
        assert!(!sessions.send_to(quiet, "{}".into()));
        assert!(sessions.unregister(chatty));
        assert!(sessions.is_empty());
    }
}
