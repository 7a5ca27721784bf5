//! PostgreSQL access: pool construction and the store traits used by services.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{FeedPostRow, FeedQuery, NewPostReport, PostId, PostRecord, UserId};

pub mod like_repo;
pub mod post_repo;
pub mod report_repo;
pub mod user_repo;

pub use like_repo::LikeRepository;
pub use post_repo::PostRepository;
pub use report_repo::ReportRepository;
pub use user_repo::UserRepository;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Internal id for a viewer identity (username).
    async fn resolve_user_id(&self, identity: &str) -> Result<Option<UserId>>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_post(&self, post_id: PostId) -> Result<Option<PostRecord>>;

    /// Returns false when the post no longer exists.
    async fn update_hot_score(&self, post_id: PostId, score: f64) -> Result<bool>;

    /// Public posts not reported by the viewer, ranked and keyset-paginated.
    async fn list_feed_posts(&self, query: &FeedQuery) -> Result<Vec<FeedPostRow>>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Whether the viewer has reported the post at any time.
    async fn is_excluded_for_viewer(&self, viewer_id: UserId, post_id: PostId) -> Result<bool>;

    /// Whether the viewer reported the post at or after `since`.
    async fn has_recent_report(
        &self,
        viewer_id: UserId,
        post_id: PostId,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    async fn create_report(&self, report: &NewPostReport) -> Result<()>;
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Subset of `post_ids` the viewer has liked, in one query.
    async fn batch_is_liked(&self, viewer_id: UserId, post_ids: &[PostId])
        -> Result<HashSet<PostId>>;
}

/// Build the pool and verify it with `SELECT 1` before handing it out.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(&config.url)?.options([(
        "statement_timeout",
        config.statement_timeout_ms.to_string(),
    )]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    match tokio::time::timeout(VERIFY_TIMEOUT, sqlx::query("SELECT 1").execute(&pool)).await {
        Ok(Ok(_)) => {
            info!(
                max_connections = config.max_connections,
                min_connections = config.min_connections,
                statement_timeout_ms = config.statement_timeout_ms,
                "Database pool created and verified"
            );
            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Database connection verification failed");
            Err(e.into())
        }
        Err(_) => {
            error!(
                timeout_secs = VERIFY_TIMEOUT.as_secs(),
                "Database connection verification timeout"
            );
            Err(sqlx::Error::PoolTimedOut.into())
        }
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| crate::error::AppError::Database(e.into()))?;
    info!("Database migrations applied");
    Ok(())
}
