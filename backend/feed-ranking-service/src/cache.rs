//! Feed page cache
//!
//! One entry per (viewer, cursor) page:
//! - feed:posts:{url-encoded viewer}:cursor:{cursor|start} → serialized FeedPage
//!
//! The cache is advisory. Every failure (connection, timeout, decode) is logged
//! and reported to the caller as a miss, or silently drops the write.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use crate::models::{FeedPage, PostId};
use crate::utils::with_redis_timeout;

pub const DEFAULT_FEED_TTL: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedCacheKey {
    pub viewer: String,
    pub cursor: Option<PostId>,
}

impl FeedCacheKey {
    pub fn new(viewer: impl Into<String>, cursor: Option<PostId>) -> Self {
        Self {
            viewer: viewer.into(),
            cursor,
        }
    }
}

impl fmt::Display for FeedCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let viewer = urlencoding::encode(&self.viewer);
        match self.cursor {
            Some(cursor) => write!(f, "feed:posts:{}:cursor:{}", viewer, cursor),
            None => write!(f, "feed:posts:{}:cursor:start", viewer),
        }
    }
}

#[async_trait]
pub trait FeedCache: Send + Sync {
    /// Cached page for the key, or `None` on miss or any backend failure.
    async fn get(&self, key: &FeedCacheKey) -> Option<FeedPage>;

    /// Store a page for `ttl`. Failures are logged and swallowed.
    async fn set(&self, key: &FeedCacheKey, page: &FeedPage, ttl: Duration);

    fn backend(&self) -> &'static str;
}

/// Redis-backed cache shared across service instances
#[derive(Clone)]
pub struct RedisFeedCache {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisFeedCache {
    pub fn new(conn: ConnectionManager, timeout: Duration) -> Self {
        Self { conn, timeout }
    }
}

#[async_trait]
impl FeedCache for RedisFeedCache {
    async fn get(&self, key: &FeedCacheKey) -> Option<FeedPage> {
        let redis_key = key.to_string();
        let mut conn = self.conn.clone();

        let value: Option<String> = match with_redis_timeout(
            self.timeout,
            "GET",
            redis::cmd("GET").arg(&redis_key).query_async(&mut conn),
        )
        .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %redis_key, error = %e, "Feed cache read failed, treating as miss");
                return None;
            }
        };

        let json = value?;
        match serde_json::from_str::<FeedPage>(&json) {
            Ok(page) => {
                debug!(key = %redis_key, "Feed cache hit");
                Some(page)
            }
            Err(e) => {
                warn!(key = %redis_key, error = %e, "Feed cache entry undecodable, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &FeedCacheKey, page: &FeedPage, ttl: Duration) {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            return;
        }

        let redis_key = key.to_string();
        let json = match serde_json::to_string(page) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %redis_key, error = %e, "Feed cache serialization failed");
                return;
            }
        };

        let mut conn = self.conn.clone();
        if let Err(e) = with_redis_timeout(
            self.timeout,
            "SETEX",
            redis::cmd("SETEX")
                .arg(&redis_key)
                .arg(ttl_secs)
                .arg(&json)
                .query_async::<_, ()>(&mut conn),
        )
        .await
        {
            warn!(key = %redis_key, error = %e, "Feed cache write failed");
            return;
        }

        debug!(key = %redis_key, ttl_secs, "Cached feed page");
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

struct CachedEntry {
    page: FeedPage,
    expires_at: Instant,
}

/// Process-local cache for single-instance deployments and tests
///
/// Writes sweep expired entries once the previous sweep's TTL window has
/// passed, so keys that are never read again do not accumulate.
pub struct InMemoryFeedCache {
    entries: DashMap<String, CachedEntry>,
    epoch: Instant,
    /// Milliseconds after `epoch` at which the next write sweeps
    next_sweep_ms: AtomicU64,
}

impl Default for InMemoryFeedCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            epoch: Instant::now(),
            next_sweep_ms: AtomicU64::new(0),
        }
    }
}

impl InMemoryFeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep_if_due(&self, ttl: Duration) {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        let due = self.next_sweep_ms.load(Ordering::Relaxed);
        if now_ms < due {
            return;
        }
        let next = now_ms.saturating_add(ttl.as_millis() as u64);
        // One writer wins the sweep; the others carry on
        if self
            .next_sweep_ms
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "Swept expired feed cache entries");
        }
    }

    /// Live entries; expired ones are purged first.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FeedCache for InMemoryFeedCache {
    async fn get(&self, key: &FeedCacheKey) -> Option<FeedPage> {
        let redis_key = key.to_string();
        let now = Instant::now();

        match self.entries.get(&redis_key) {
            Some(entry) if entry.expires_at > now => return Some(entry.page.clone()),
            Some(_) => {}
            None => return None,
        }

        // expired
        self.entries
            .remove_if(&redis_key, |_, entry| entry.expires_at <= now);
        None
    }

    async fn set(&self, key: &FeedCacheKey, page: &FeedPage, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.sweep_if_due(ttl);
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                page: page.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Always misses; used when no cache backend could be initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFeedCache;

#[async_trait]
impl FeedCache for NullFeedCache {
    async fn get(&self, _key: &FeedCacheKey) -> Option<FeedPage> {
        None
    }

    async fn set(&self, _key: &FeedCacheKey, _page: &FeedPage, _ttl: Duration) {}

    fn backend(&self) -> &'static str {
        "none"
    }
}
