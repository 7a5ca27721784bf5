use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_FEED_TTL;
use crate::jobs::DEFAULT_THROTTLE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub feed: FeedConfig,
    pub hot_score: HotScoreConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_ms: u64,
    pub run_migrations: bool,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub cache_backend: CacheBackend,
    pub cache_ttl_secs: u64,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotScoreConfig {
    pub queue_backend: QueueBackend,
    pub queue_key: String,
    pub lock_key: String,
    pub lock_stale_secs: u64,
    pub throttle_ms: u64,
    /// 0 disables the in-process scheduler; the cron binary is then the only runner.
    pub worker_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub root: String,
    pub public_prefix: String,
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
    None,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "none" | "off" => Ok(Self::None),
            other => Err(anyhow!("unknown feed cache backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    Redis,
    Memory,
}

impl FromStr for QueueBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown hot score queue backend '{}'", other)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            app: AppConfig {
                env: env_or("APP_ENV", "development"),
                host: env_or("APP_HOST", "0.0.0.0"),
                port: parse_env("APP_PORT", 8089)?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL environment variable not set")?,
                max_connections: parse_env("DB_MAX_CONNECTIONS", 8)?,
                min_connections: parse_env("DB_MIN_CONNECTIONS", 2)?,
                acquire_timeout_secs: parse_env("DB_ACQUIRE_TIMEOUT_SECS", 10)?,
                statement_timeout_ms: parse_env("DB_STATEMENT_TIMEOUT_MS", 5000)?,
                run_migrations: parse_env("RUN_MIGRATIONS", false)?,
            },
            redis: RedisConfig {
                url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
                timeout_ms: parse_env("REDIS_TIMEOUT_MS", 500)?,
            },
            feed: FeedConfig {
                cache_backend: parse_env("FEED_CACHE_BACKEND", CacheBackend::Redis)?,
                cache_ttl_secs: parse_env("FEED_CACHE_TTL_SECS", DEFAULT_FEED_TTL.as_secs())?,
                page_size: parse_env("FEED_PAGE_SIZE", 10)?,
            },
            hot_score: HotScoreConfig {
                queue_backend: parse_env("HOT_SCORE_QUEUE_BACKEND", QueueBackend::Redis)?,
                queue_key: env_or("HOT_SCORE_QUEUE_KEY", "feed:hot_score:queue"),
                lock_key: env_or("HOT_SCORE_LOCK_KEY", "feed:hot_score:worker_lock"),
                lock_stale_secs: parse_env("HOT_SCORE_LOCK_STALE_SECS", 300)?,
                throttle_ms: parse_env(
                    "HOT_SCORE_THROTTLE_MS",
                    DEFAULT_THROTTLE.as_millis() as u64,
                )?,
                worker_interval_secs: parse_env("HOT_SCORE_WORKER_INTERVAL_SECS", 0)?,
            },
            media: MediaConfig {
                root: env_or("MEDIA_ROOT", "./public/feed"),
                public_prefix: env_or("MEDIA_PUBLIC_PREFIX", "/feed"),
                encryption_key: std::env::var("MEDIA_ENCRYPTION_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
            },
        }
        .validated()?)
    }

    fn validated(self) -> Result<Self> {
        if self.feed.page_size == 0 || self.feed.page_size > 100 {
            return Err(anyhow!(
                "FEED_PAGE_SIZE must be between 1 and 100, got {}",
                self.feed.page_size
            ));
        }
        if self.hot_score.lock_stale_secs == 0 {
            return Err(anyhow!("HOT_SCORE_LOCK_STALE_SECS must be positive"));
        }
        Ok(self)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "APP_PORT",
        "FEED_CACHE_BACKEND",
        "FEED_CACHE_TTL_SECS",
        "FEED_PAGE_SIZE",
        "HOT_SCORE_QUEUE_BACKEND",
        "HOT_SCORE_LOCK_STALE_SECS",
        "HOT_SCORE_THROTTLE_MS",
        "MEDIA_ENCRYPTION_KEY",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_default_values() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.port, 8089);
        assert_eq!(config.feed.cache_backend, CacheBackend::Redis);
        assert_eq!(config.feed.cache_ttl_secs, 45);
        assert_eq!(config.feed.page_size, 10);
        assert_eq!(config.hot_score.queue_backend, QueueBackend::Redis);
        assert_eq!(config.hot_score.lock_stale_secs, 300);
        assert_eq!(config.hot_score.throttle_ms, 200);
        assert!(config.media.encryption_key.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides_and_invalid_values() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("FEED_CACHE_BACKEND", "memory");
        std::env::set_var("HOT_SCORE_QUEUE_BACKEND", "Memory");
        std::env::set_var("FEED_PAGE_SIZE", "25");

        let config = Config::from_env().unwrap();
        assert_eq!(config.feed.cache_backend, CacheBackend::Memory);
        assert_eq!(config.hot_score.queue_backend, QueueBackend::Memory);
        assert_eq!(config.feed.page_size, 25);

        std::env::set_var("FEED_PAGE_SIZE", "0");
        assert!(Config::from_env().is_err());

        std::env::set_var("FEED_PAGE_SIZE", "ten");
        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_database_config_debug_redacts_url() {
        let db = DatabaseConfig {
            url: "postgres://user:secret@db/feed".to_string(),
            max_connections: 8,
            min_connections: 2,
            acquire_timeout_secs: 10,
            statement_timeout_ms: 5000,
            run_migrations: false,
        };
        let rendered = format!("{:?}", db);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
