//! Shared verdict store with broadcast, degrading to process-local state.
//!
//! Every write is mirrored into a [`LocalStore`] so that reads keep working
//! the moment the shared service disappears. Broadcasts always reach local
//! subscribers directly; the durable channel carries them to other instances,
//! and echoes of our own messages are dropped by `origin`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_core::config::StoreConfig;
use warden_core::{NoopObserver, OperationObserver, Outcome, Verdict};

use crate::error::RelayError;
use crate::local::LocalStore;
use crate::message::{BroadcastMessage, Message};
use crate::traits::DurableBackend;

const COMPONENT: &str = "store";
const LOCAL_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    Durable,
    Degraded,
}

impl StoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMode::Durable => "durable",
            StoreMode::Degraded => "degraded",
        }
    }
}

pub struct SharedStore {
    instance_id: Uuid,
    durable: Option<Arc<dyn DurableBackend>>,
    local: LocalStore,
    bus: broadcast::Sender<BroadcastMessage>,
    degraded: AtomicBool,
    config: StoreConfig,
    observer: Arc<dyn OperationObserver>,
    shutdown: Notify,
}

impl SharedStore {
    /// Build a store over `durable`, probing it once. An unreachable or
    /// missing backend starts the store in degraded mode.
    pub async fn new(
        durable: Option<Arc<dyn DurableBackend>>,
        config: StoreConfig,
        observer: Arc<dyn OperationObserver>,
    ) -> Arc<Self> {
        let (bus, _) = broadcast::channel(LOCAL_BUS_CAPACITY);
        let store = Arc::new(Self {
            instance_id: Uuid::new_v4(),
            local: LocalStore::new(config.max_retained),
            durable,
            bus,
            degraded: AtomicBool::new(false),
            config,
            observer,
            shutdown: Notify::new(),
        });

        match &store.durable {
            Some(backend) => match backend.ping().await {
                Ok(()) => info!(backend = backend.kind(), "shared store connected"),
                Err(e) => store.enter_degraded("connect", &e),
            },
            None => {
                store.degraded.store(true, Ordering::SeqCst);
                warn!("no shared service configured; verdicts and broadcasts stay process-local");
            }
        }
        store
    }

    /// Connect to the configured Redis deployment.
    #[cfg(feature = "redis")]
    #[tracing::instrument(skip_all, fields(url = %warden_core::config::redact_url(&config.redis_url)))]
    pub async fn connect(config: StoreConfig, observer: Arc<dyn OperationObserver>) -> Arc<Self> {
        match crate::redis_backend::RedisBackend::new(&config) {
            Ok(backend) => Self::new(Some(Arc::new(backend)), config, observer).await,
            Err(e) => {
                warn!(error = %e, "invalid redis configuration");
                Self::new(None, config, observer).await
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    pub async fn connect(config: StoreConfig, observer: Arc<dyn OperationObserver>) -> Arc<Self> {
        warn!("built without the 'redis' feature");
        Self::new(None, config, observer).await
    }

    /// Process-local store with no shared service at all.
    pub async fn local_only(config: StoreConfig) -> Arc<Self> {
        Self::new(None, config, Arc::new(NoopObserver)).await
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn mode(&self) -> StoreMode {
        if self.is_degraded() {
            StoreMode::Degraded
        } else {
            StoreMode::Durable
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn backend_kind(&self) -> &'static str {
        self.durable.as_ref().map(|b| b.kind()).unwrap_or("local")
    }

    // ── Mode transitions ─────────────────────────────────────────────

    fn enter_degraded(&self, operation: &str, error: &RelayError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(
                operation,
                error = %error,
                "shared service unreachable; switching to process-local store and broadcast"
            );
        }
    }

    fn leave_degraded(&self) {
        if self.durable.is_some() && self.degraded.swap(false, Ordering::SeqCst) {
            info!(backend = self.backend_kind(), "shared service reachable again; durable mode restored");
        }
    }

    /// Run `call` against the durable backend unless degraded. `None` means
    /// the caller should serve the operation locally.
    async fn durable_call<T, F, Fut>(&self, operation: &str, call: F) -> Option<T>
    where
        F: FnOnce(Arc<dyn DurableBackend>) -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let backend = match &self.durable {
            Some(b) if !self.is_degraded() => Arc::clone(b),
            _ => {
                self.observer.record(COMPONENT, operation, Outcome::Degraded, Duration::ZERO);
                return None;
            }
        };

        let start = Instant::now();
        match call(backend).await {
            Ok(value) => {
                self.observer.record(COMPONENT, operation, Outcome::Ok, start.elapsed());
                Some(value)
            }
            Err(e) => {
                let outcome = match e {
                    RelayError::Timeout(_) => Outcome::TimedOut,
                    _ => Outcome::Failed,
                };
                self.observer.record(COMPONENT, operation, outcome, start.elapsed());
                self.enter_degraded(operation, &e);
                None
            }
        }
    }

    // ── Store operations ─────────────────────────────────────────────

    pub async fn put(&self, verdict: &Verdict) {
        self.local.put(verdict);
        let retain = self.config.max_retained;
        self.durable_call("put", |b| async move { b.put(verdict, retain).await })
            .await;
    }

    pub async fn get(&self, id: Uuid) -> Option<Verdict> {
        match self.durable_call("get", |b| async move { b.get(id).await }).await {
            Some(Some(verdict)) => Some(verdict),
            // Verdicts written while degraded only exist locally.
            _ => self.local.get(id),
        }
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Vec<Verdict> {
        match self
            .durable_call("list", |b| async move { b.list(limit, offset).await })
            .await
        {
            Some(page) => page,
            None => self.local.list(limit, offset),
        }
    }

    pub async fn total_count(&self) -> u64 {
        match self
            .durable_call("total_count", |b| async move { b.total_count().await })
            .await
        {
            Some(n) => n,
            None => self.local.total_count(),
        }
    }

    // ── Broadcast ────────────────────────────────────────────────────

    /// Announce a new verdict to every instance.
    pub async fn publish(&self, verdict: &Verdict) {
        self.broadcast(BroadcastMessage::NewVerdict(verdict.clone()))
            .await;
    }

    /// Deliver to local subscribers now and, when durable, to every other instance.
    pub async fn broadcast(&self, message: BroadcastMessage) {
        let envelope = match message.to_message(self.instance_id) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "failed to encode broadcast message");
                None
            }
        };
        // No local subscribers is fine: at-most-once.
        let _ = self.bus.send(message);

        if let Some(envelope) = envelope {
            self.durable_call("publish", |b| async move { b.publish(envelope).await })
                .await;
        }
    }

    /// Stream of broadcast messages seen by this instance. Messages a slow
    /// consumer falls behind on are skipped.
    pub fn subscribe(&self) -> BoxStream<'static, BroadcastMessage> {
        BroadcastStream::new(self.bus.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(message) => Some(message),
                    Err(e) => {
                        warn!(error = %e, "broadcast subscriber lagged");
                        None
                    }
                }
            })
            .boxed()
    }

    fn forward(&self, message: Message) {
        if message.origin == self.instance_id {
            return;
        }
        match BroadcastMessage::from_message(&message) {
            Ok(decoded) => {
                debug!(topic = %message.topic, origin = %message.origin, "relaying remote broadcast");
                let _ = self.bus.send(decoded);
            }
            Err(e) => warn!(topic = %message.topic, error = %e, "dropping undecodable broadcast"),
        }
    }

    // ── Supervisor ───────────────────────────────────────────────────

    /// Spawn the background task that keeps the durable subscription alive
    /// and restores durable mode once the service answers again.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let backend = self.durable.clone()?;
        let store = Arc::clone(self);
        Some(tokio::spawn(async move { store.supervise(backend).await }))
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    async fn supervise(&self, backend: Arc<dyn DurableBackend>) {
        let mut attempt: u32 = 0;
        loop {
            match backend.subscribe().await {
                Ok(stream) => {
                    attempt = 0;
                    if self.is_degraded() && backend.ping().await.is_ok() {
                        self.leave_degraded();
                    }
                    info!(backend = backend.kind(), "broadcast subscription established");
                    if self.pump(&backend, stream).await {
                        break;
                    }
                    warn!("broadcast subscription lost");
                }
                Err(e) => self.enter_degraded("subscribe", &e),
            }

            attempt = attempt.saturating_add(1);
            let delay = self.config.reconnect_delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "resubscribing after backoff");
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!("store supervisor stopped");
    }

    /// Relay remote messages until the stream ends. Returns true on shutdown.
    async fn pump(
        &self,
        backend: &Arc<dyn DurableBackend>,
        mut stream: BoxStream<'static, Message>,
    ) -> bool {
        let mut health_check = tokio::time::interval(self.config.health_check_interval());
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return true,
                next = stream.next() => match next {
                    Some(message) => self.forward(message),
                    None => return false,
                },
                _ = health_check.tick() => {
                    if self.is_degraded() && backend.ping().await.is_ok() {
                        self.leave_degraded();
                    }
                }
            }
        }
    }
}
