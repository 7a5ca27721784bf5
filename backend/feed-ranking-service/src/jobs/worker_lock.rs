//! Mutual exclusion for the hot score worker
//!
//! A lock older than its staleness threshold counts as abandoned and can be
//! taken over, so a crashed worker blocks other runs for at most that long.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::utils::with_redis_timeout;

/// Proof of ownership handed back on release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockToken {
    fn generate() -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            acquired_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait WorkerLock: Send + Sync {
    /// `Some` when the lock was free or stale, `None` while another holder is live.
    async fn try_acquire(&self) -> Result<Option<LockToken>>;

    /// Release only if `token` still owns the lock. Returns whether it did.
    async fn release(&self, token: &LockToken) -> Result<bool>;
}

const RELEASE_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

/// `SET key token NX EX stale_secs`; Redis expiry drops abandoned locks.
#[derive(Clone)]
pub struct RedisWorkerLock {
    conn: ConnectionManager,
    key: String,
    stale_after: Duration,
    timeout: Duration,
}

impl RedisWorkerLock {
    pub fn new(
        conn: ConnectionManager,
        key: impl Into<String>,
        stale_after: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            conn,
            key: key.into(),
            stale_after,
            timeout,
        }
    }
}

#[async_trait]
impl WorkerLock for RedisWorkerLock {
    async fn try_acquire(&self) -> Result<Option<LockToken>> {
        let token = LockToken::generate();
        let ttl_secs = self.stale_after.as_secs().max(1);
        let mut conn = self.conn.clone();

        let reply: Option<String> = with_redis_timeout(
            self.timeout,
            "SET NX EX",
            redis::cmd("SET")
                .arg(&self.key)
                .arg(&token.token)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn),
        )
        .await?;

        if reply.is_some() {
            debug!(key = %self.key, ttl_secs, "Acquired worker lock");
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    async fn release(&self, token: &LockToken) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = with_redis_timeout(
            self.timeout,
            "EVAL release",
            redis::Script::new(RELEASE_SCRIPT)
                .key(&self.key)
                .arg(&token.token)
                .invoke_async(&mut conn),
        )
        .await?;

        if deleted == 0 {
            warn!(key = %self.key, "Worker lock was no longer owned at release");
        }
        Ok(deleted > 0)
    }
}

#[derive(Debug)]
struct HeldLock {
    token: String,
    acquired: Instant,
}

/// Process-local lock for single-instance deployments
#[derive(Debug)]
pub struct InMemoryWorkerLock {
    held: Mutex<Option<HeldLock>>,
    stale_after: Duration,
}

impl InMemoryWorkerLock {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            held: Mutex::new(None),
            stale_after,
        }
    }
}

#[async_trait]
impl WorkerLock for InMemoryWorkerLock {
    async fn try_acquire(&self) -> Result<Option<LockToken>> {
        let mut held = self.held.lock().await;

        if let Some(current) = held.as_ref() {
            let age = current.acquired.elapsed();
            if age < self.stale_after {
                return Ok(None);
            }
            warn!(
                age_secs = age.as_secs(),
                "Taking over stale worker lock"
            );
        }

        let token = LockToken::generate();
        *held = Some(HeldLock {
            token: token.token.clone(),
            acquired: Instant::now(),
        });
        Ok(Some(token))
    }

    async fn release(&self, token: &LockToken) -> Result<bool> {
        let mut held = self.held.lock().await;
        match held.as_ref() {
            Some(current) if current.token == token.token => {
                *held = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_lock_blocks_second_holder() {
        let lock = InMemoryWorkerLock::new(Duration::from_secs(300));
        let token = lock.try_acquire().await.unwrap().expect("first acquire");
        assert!(lock.try_acquire().await.unwrap().is_none());

        assert!(lock.release(&token).await.unwrap());
        assert!(lock.try_acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let lock = InMemoryWorkerLock::new(Duration::from_millis(20));
        let first = lock.try_acquire().await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        let second = lock.try_acquire().await.unwrap().expect("stale takeover");
        assert_ne!(first.token, second.token);

        // The superseded holder cannot release the new owner's lock
        assert!(!lock.release(&first).await.unwrap());
        assert!(lock.try_acquire().await.unwrap().is_none());
        assert!(lock.release(&second).await.unwrap());
    }
}
