//! Wiring: turns a [`Config`] into connected services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::cache::{FeedCache, InMemoryFeedCache, NullFeedCache, RedisFeedCache};
use crate::config::{CacheBackend, Config, QueueBackend, RedisConfig};
use crate::db::{self, LikeRepository, PostRepository, ReportRepository, UserRepository};
use crate::jobs::{HotScoreWorker, InMemoryWorkerLock, RedisWorkerLock, WorkerLock};
use crate::queue::{HotScoreQueue, InMemoryHotScoreQueue, RedisHotScoreQueue};
use crate::services::{
    EncryptedMediaResolver, FeedService, FeedSettings, FeedStores, MediaResolver,
    PlainMediaResolver, ReportService,
};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state handed to HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub feed: FeedService,
    pub reports: ReportService,
}

/// Everything the HTTP server needs, including the worker for the in-process loop.
pub struct Application {
    pub state: AppState,
    pub worker: Arc<HotScoreWorker>,
    pub pool: PgPool,
}

pub async fn build_state(config: &Config) -> Result<Application> {
    let pool = connect_database(config).await?;

    let redis = if config.feed.cache_backend == CacheBackend::Redis
        || config.hot_score.queue_backend == QueueBackend::Redis
    {
        match connect_redis(&config.redis).await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "Redis unavailable at startup");
                None
            }
        }
    } else {
        None
    };

    let queue = build_queue(config, redis.clone())?;
    let lock = build_lock(config, redis.clone())?;
    let cache = build_cache(config, redis);
    let media = build_media_resolver(config)?;

    let users = Arc::new(UserRepository::new(pool.clone()));
    let posts = Arc::new(PostRepository::new(pool.clone()));
    let reports = Arc::new(ReportRepository::new(pool.clone()));
    let likes = Arc::new(LikeRepository::new(pool.clone()));

    let feed = FeedService::new(
        FeedStores {
            users: users.clone(),
            posts: posts.clone(),
            likes,
        },
        media,
        queue.clone(),
        cache,
        FeedSettings {
            page_size: config.feed.page_size,
            cache_ttl: Duration::from_secs(config.feed.cache_ttl_secs),
        },
    );
    let report_service = ReportService::new(users, posts.clone(), reports);

    let worker = Arc::new(HotScoreWorker::new(
        posts,
        queue,
        lock,
        Duration::from_millis(config.hot_score.throttle_ms),
    ));

    Ok(Application {
        state: AppState {
            feed,
            reports: report_service,
        },
        worker,
        pool,
    })
}

/// Worker for the standalone cron binary: database, queue and lock only.
pub async fn build_worker(config: &Config) -> Result<HotScoreWorker> {
    let pool = connect_database(config).await?;

    let redis = match config.hot_score.queue_backend {
        QueueBackend::Redis => Some(
            connect_redis(&config.redis)
                .await
                .context("Redis is required for the hot score queue")?,
        ),
        QueueBackend::Memory => {
            warn!("In-memory hot score queue in a standalone worker only sees its own process");
            None
        }
    };

    let queue = build_queue(config, redis.clone())?;
    let lock = build_lock(config, redis)?;

    Ok(HotScoreWorker::new(
        Arc::new(PostRepository::new(pool)),
        queue,
        lock,
        Duration::from_millis(config.hot_score.throttle_ms),
    ))
}

async fn connect_database(config: &Config) -> Result<PgPool> {
    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    if config.database.run_migrations {
        db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }
    Ok(pool)
}

async fn connect_redis(config: &RedisConfig) -> Result<ConnectionManager> {
    let client = redis::Client::open(config.url.as_str()).context("Invalid REDIS_URL")?;

    let conn = tokio::time::timeout(REDIS_CONNECT_TIMEOUT, ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow!("Redis connection timed out"))?
        .context("Failed to connect to Redis")?;

    info!("Connected to Redis");
    Ok(conn)
}

fn build_queue(
    config: &Config,
    redis: Option<ConnectionManager>,
) -> Result<Arc<dyn HotScoreQueue>> {
    match (config.hot_score.queue_backend, redis) {
        (QueueBackend::Redis, Some(conn)) => Ok(Arc::new(RedisHotScoreQueue::new(
            conn,
            config.hot_score.queue_key.clone(),
            config.redis.timeout(),
        ))),
        (QueueBackend::Redis, None) => Err(anyhow!(
            "HOT_SCORE_QUEUE_BACKEND=redis but Redis is unavailable"
        )),
        (QueueBackend::Memory, _) => Ok(Arc::new(InMemoryHotScoreQueue::new())),
    }
}

fn build_lock(config: &Config, redis: Option<ConnectionManager>) -> Result<Arc<dyn WorkerLock>> {
    let stale_after = Duration::from_secs(config.hot_score.lock_stale_secs);
    match (config.hot_score.queue_backend, redis) {
        (QueueBackend::Redis, Some(conn)) => Ok(Arc::new(RedisWorkerLock::new(
            conn,
            config.hot_score.lock_key.clone(),
            stale_after,
            config.redis.timeout(),
        ))),
        (QueueBackend::Redis, None) => Err(anyhow!(
            "Redis worker lock requested but Redis is unavailable"
        )),
        (QueueBackend::Memory, _) => Ok(Arc::new(InMemoryWorkerLock::new(stale_after))),
    }
}

fn build_cache(config: &Config, redis: Option<ConnectionManager>) -> Arc<dyn FeedCache> {
    let cache: Arc<dyn FeedCache> = match (config.feed.cache_backend, redis) {
        (CacheBackend::Redis, Some(conn)) => {
            Arc::new(RedisFeedCache::new(conn, config.redis.timeout()))
        }
        (CacheBackend::Redis, None) => {
            warn!("Feed cache disabled: Redis failed to initialise");
            Arc::new(NullFeedCache)
        }
        (CacheBackend::Memory, _) => Arc::new(InMemoryFeedCache::new()),
        (CacheBackend::None, _) => Arc::new(NullFeedCache),
    };
    info!(backend = cache.backend(), "Feed cache ready");
    cache
}

fn build_media_resolver(config: &Config) -> Result<Arc<dyn MediaResolver>> {
    let media = &config.media;
    match media.encryption_key.as_deref() {
        Some(key) => {
            let resolver = EncryptedMediaResolver::new(key, &media.root, &media.public_prefix)
                .map_err(|e| anyhow!("Invalid MEDIA_ENCRYPTION_KEY: {}", e))?;
            Ok(Arc::new(resolver))
        }
        None => {
            info!("MEDIA_ENCRYPTION_KEY not set, media paths are read as plain text");
            Ok(Arc::new(PlainMediaResolver::new(
                &media.root,
                &media.public_prefix,
            )))
        }
    }
}
