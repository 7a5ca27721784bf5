//! Hot-score recomputation queue
//!
//! The feed appends every served post id; the worker drains the whole queue
//! into a set. Duplicates collapse at drain time, so enqueue stays append-only.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::PostId;

mod redis_queue;

pub use redis_queue::RedisHotScoreQueue;

#[async_trait]
pub trait HotScoreQueue: Send + Sync {
    async fn enqueue(&self, post_id: PostId) -> Result<()> {
        self.enqueue_many(&[post_id]).await
    }

    /// Append a batch in one round trip. Empty batches are a no-op.
    async fn enqueue_many(&self, post_ids: &[PostId]) -> Result<()>;

    /// Take every queued id, deduplicated, and leave the queue empty.
    ///
    /// Ids appended concurrently land either in this drain or the next one.
    async fn drain_all(&self) -> Result<HashSet<PostId>>;

    fn backend(&self) -> &'static str;
}

/// Single-process queue backed by a mutex-guarded vector
#[derive(Default)]
pub struct InMemoryHotScoreQueue {
    entries: Mutex<Vec<PostId>>,
}

impl InMemoryHotScoreQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry count, duplicates included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl HotScoreQueue for InMemoryHotScoreQueue {
    async fn enqueue_many(&self, post_ids: &[PostId]) -> Result<()> {
        if post_ids.is_empty() {
            return Ok(());
        }
        self.entries.lock().await.extend_from_slice(post_ids);
        Ok(())
    }

    async fn drain_all(&self) -> Result<HashSet<PostId>> {
        let drained = std::mem::take(&mut *self.entries.lock().await);
        Ok(drained.into_iter().filter(|&id| id > 0).collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
