//! FIFO queue of CV-job ids with two back-ends: a Redis list for durability
//! and a bounded in-process channel as the fallback when the broker is
//! unreachable at startup.

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

/// In-process fallback buffer size.
const MEMORY_QUEUE_BUFFER: usize = 100;
/// Redis list key holding queued CV ids.
const QUEUE_KEY: &str = "cv:processing:queue";

#[async_trait]
pub trait CvQueue: Send + Sync {
    async fn enqueue(&self, id: Uuid) -> Result<(), AppError>;
    /// Blocks until an id is available or `ctx` is cancelled.
    async fn dequeue(&self, ctx: &CancellationToken) -> Result<Uuid, AppError>;
}

// ── Redis-backed queue ──────────────────────────────────────────────────────

pub struct RedisQueue {
    client: redis::Client,
}

impl RedisQueue {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CvQueue for RedisQueue {
    async fn enqueue(&self, id: Uuid) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::StorageIo(format!("redis connect: {e}")))?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, id.to_string())
            .await
            .map_err(|e| AppError::StorageIo(format!("redis enqueue: {e}")))?;
        Ok(())
    }

    async fn dequeue(&self, ctx: &CancellationToken) -> Result<Uuid, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::StorageIo(format!("redis connect: {e}")))?;

        loop {
            // Blocking right-pop with a short timeout so cancellation is
            // observed promptly.
            let popped: Option<(String, String)> = tokio::select! {
                r = conn.brpop(QUEUE_KEY, 5.0) => {
                    r.map_err(|e| AppError::StorageIo(format!("redis dequeue: {e}")))?
                }
                _ = ctx.cancelled() => return Err(AppError::Cancelled),
            };

            if let Some((_, value)) = popped {
                return Uuid::parse_str(&value).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("malformed id on queue: {e}"))
                });
            }
        }
    }
}

// ── In-process fallback queue ───────────────────────────────────────────────

pub struct MemoryQueue {
    tx: mpsc::Sender<Uuid>,
    rx: Mutex<mpsc::Receiver<Uuid>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(MEMORY_QUEUE_BUFFER);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CvQueue for MemoryQueue {
    async fn enqueue(&self, id: Uuid) -> Result<(), AppError> {
        self.tx
            .send(id)
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("cv queue closed")))
    }

    async fn dequeue(&self, ctx: &CancellationToken) -> Result<Uuid, AppError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            id = rx.recv() => id.ok_or_else(|| AppError::Internal(anyhow::anyhow!("cv queue closed"))),
            _ = ctx.cancelled() => Err(AppError::Cancelled),
        }
    }
}

/// Probes the broker and picks the durable queue when it answers, the
/// in-process channel otherwise.
pub async fn select_queue(redis_url: Option<&str>) -> std::sync::Arc<dyn CvQueue> {
    if let Some(url) = redis_url {
        match probe_redis(url).await {
            Ok(client) => {
                info!("CV queue: using Redis broker");
                return std::sync::Arc::new(RedisQueue::new(client));
            }
            Err(e) => {
                warn!("CV queue: Redis unreachable ({e}), using in-process queue");
            }
        }
    }
    std::sync::Arc::new(MemoryQueue::new())
}

async fn probe_redis(url: &str) -> Result<redis::Client, anyhow::Error> {
    let client = redis::Client::open(url)?;
    let mut conn = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        client.get_multiplexed_async_connection(),
    )
    .await??;
    redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
    Ok(client)
}
