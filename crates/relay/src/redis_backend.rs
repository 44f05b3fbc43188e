//! Redis-backed shared service.
//!
//! Layout under the configured key prefix:
//! - `{prefix}verdict:{id}`: verdict JSON
//! - `{prefix}verdicts:index`: sorted set of ids scored by insertion sequence
//! - `{prefix}verdicts:seq`: insertion sequence backing the index scores
//! - `{prefix}verdicts:total_count`: number of distinct verdict ids ever stored
//!
//! Broadcast uses Redis pub/sub on `{prefix}{channel}` with MessagePack envelopes.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use warden_core::config::{redact_url, StoreConfig};
use warden_core::Verdict;

use crate::error::RelayError;
use crate::message::Message;
use crate::traits::{DurableBackend, EventPublisher, EventSubscriber, VerdictRepository};

/// Upper bound on any single round trip, so an unresponsive server trips
/// degraded mode instead of stalling requests.
const OP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RedisBackend {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
    channel: String,
    key_prefix: String,
    index_key: String,
    seq_key: String,
    total_key: String,
}

impl RedisBackend {
    /// Build a backend without connecting; the connection is opened on first use
    /// and re-attempted after failures.
    pub fn new(config: &StoreConfig) -> Result<Self, RelayError> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        debug!(url = %redact_url(&config.redis_url), "redis client configured");
        Ok(Self {
            client,
            conn: Mutex::new(None),
            channel: config.channel_name(),
            key_prefix: config.key_prefix.clone(),
            index_key: format!("{}verdicts:index", config.key_prefix),
            seq_key: format!("{}verdicts:seq", config.key_prefix),
            total_key: format!("{}verdicts:total_count", config.key_prefix),
        })
    }

    fn verdict_key(&self, id: &str) -> String {
        format!("{}verdict:{id}", self.key_prefix)
    }

    async fn connection(&self) -> Result<ConnectionManager, RelayError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = bounded(ConnectionManager::new(self.client.clone())).await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

async fn bounded<T>(
    fut: impl std::future::Future<Output = redis::RedisResult<T>>,
) -> Result<T, RelayError> {
    match tokio::time::timeout(OP_TIMEOUT, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(RelayError::Timeout(OP_TIMEOUT)),
    }
}

/// Inclusive rank bounds for a page, or `None` when the page starts past any
/// rank Redis can address.
fn rank_range(limit: usize, offset: usize) -> Option<(isize, isize)> {
    if limit == 0 {
        return None;
    }
    let start = isize::try_from(offset).ok()?;
    let stop = offset
        .checked_add(limit - 1)
        .and_then(|last| isize::try_from(last).ok())
        .unwrap_or(isize::MAX);
    Some((start, stop))
}

#[async_trait]
impl VerdictRepository for RedisBackend {
    async fn ping(&self) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        let _: String = bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    async fn put(&self, verdict: &Verdict, retain: usize) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        let id = verdict.id.to_string();
        let json = serde_json::to_string(verdict)?;
        // Insertion sequence orders the index; creation timestamps can tie.
        let seq: u64 = bounded(conn.incr(&self.seq_key, 1)).await?;

        // NX keeps a re-put at its original position.
        let (added,): (u64,) = bounded(
            redis::pipe()
                .atomic()
                .set(self.verdict_key(&id), json)
                .ignore()
                .cmd("ZADD")
                .arg(&self.index_key)
                .arg("NX")
                .arg(seq)
                .arg(&id)
                .query_async(&mut conn),
        )
        .await?;
        if added > 0 {
            let _: u64 = bounded(conn.incr(&self.total_key, 1)).await?;
        }

        // Everything below the newest `retain` entries, oldest first.
        let stop = -(retain.max(1) as isize) - 1;
        let evicted: Vec<String> = bounded(conn.zrange(&self.index_key, 0, stop)).await?;
        if !evicted.is_empty() {
            let keys: Vec<String> = evicted.iter().map(|id| self.verdict_key(id)).collect();
            let _: () = bounded(
                redis::pipe()
                    .atomic()
                    .del(keys)
                    .ignore()
                    .zrem(&self.index_key, &evicted)
                    .ignore()
                    .query_async(&mut conn),
            )
            .await?;
            debug!(evicted = evicted.len(), "trimmed verdict index");
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Verdict>, RelayError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = bounded(conn.get(self.verdict_key(&id.to_string()))).await?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Verdict>, RelayError> {
        let Some((start, stop)) = rank_range(limit, offset) else {
            return Ok(Vec::new());
        };
        let mut conn = self.connection().await?;
        let ids: Vec<String> = bounded(conn.zrevrange(&self.index_key, start, stop)).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.verdict_key(id)).collect();
        let raw: Vec<Option<String>> = bounded(redis::cmd("MGET").arg(keys).query_async(&mut conn)).await?;

        // Entries evicted between the two reads come back as nil.
        Ok(raw
            .into_iter()
            .flatten()
            .filter_map(|json| match serde_json::from_str::<Verdict>(&json) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable verdict");
                    None
                }
            })
            .collect())
    }

    async fn total_count(&self) -> Result<u64, RelayError> {
        let mut conn = self.connection().await?;
        let n: Option<u64> = bounded(conn.get(&self.total_key)).await?;
        Ok(n.unwrap_or(0))
    }
}

#[async_trait]
impl EventPublisher for RedisBackend {
    async fn publish(&self, message: Message) -> Result<(), RelayError> {
        let mut conn = self.connection().await?;
        let bytes = message.to_bytes()?;
        let receivers: i64 = bounded(conn.publish(&self.channel, bytes)).await?;
        debug!(topic = %message.topic, receivers, "published");
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for RedisBackend {
    async fn subscribe(&self) -> Result<BoxStream<'static, Message>, RelayError> {
        let mut pubsub = bounded(self.client.get_async_pubsub()).await?;
        bounded(pubsub.subscribe(&self.channel)).await?;
        debug!(channel = %self.channel, "subscribed");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: Vec<u8> = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "unreadable pub/sub payload");
                    return None;
                }
            };
            match Message::from_bytes(&payload) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!(error = %e, "dropping malformed broadcast envelope");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}

impl DurableBackend for RedisBackend {
    fn kind(&self) -> &'static str {
        "redis"
    }
}
