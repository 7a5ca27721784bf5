use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use super::HotScoreQueue;
use crate::error::Result;
use crate::models::PostId;
use crate::utils::with_redis_timeout;

/// Redis list shared by every service instance and the cron worker.
///
/// Enqueue is `RPUSH`; drain is `LRANGE 0 -1` + `DEL` inside one `MULTI`.
#[derive(Clone)]
pub struct RedisHotScoreQueue {
    conn: ConnectionManager,
    key: String,
    timeout: Duration,
}

impl RedisHotScoreQueue {
    pub fn new(conn: ConnectionManager, key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            conn,
            key: key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HotScoreQueue for RedisHotScoreQueue {
    async fn enqueue_many(&self, post_ids: &[PostId]) -> Result<()> {
        if post_ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        with_redis_timeout(
            self.timeout,
            "RPUSH",
            redis::cmd("RPUSH")
                .arg(&self.key)
                .arg(post_ids)
                .query_async::<_, i64>(&mut conn),
        )
        .await?;

        debug!(key = %self.key, count = post_ids.len(), "Enqueued posts for hot score update");
        Ok(())
    }

    async fn drain_all(&self) -> Result<HashSet<PostId>> {
        let mut conn = self.conn.clone();
        let (raw,): (Vec<String>,) = with_redis_timeout(
            self.timeout,
            "MULTI LRANGE DEL",
            redis::pipe()
                .atomic()
                .cmd("LRANGE")
                .arg(&self.key)
                .arg(0)
                .arg(-1)
                .cmd("DEL")
                .arg(&self.key)
                .ignore()
                .query_async(&mut conn),
        )
        .await?;

        Ok(parse_entries(&self.key, raw))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

fn parse_entries(key: &str, raw: Vec<String>) -> HashSet<PostId> {
    let mut ids = HashSet::with_capacity(raw.len());
    for entry in raw {
        match entry.trim().parse::<PostId>() {
            Ok(id) if id > 0 => {
                ids.insert(id);
            }
            _ => warn!(key = %key, entry = %entry, "Discarding invalid hot score queue entry"),
        }
    }
    ids
}
