use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Bound a Redis call so a stalled connection never blocks a request or the worker.
pub async fn with_redis_timeout<T, F>(timeout: Duration, op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(AppError::Redis),
        Err(_) => Err(AppError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "redis operation timed out",
            op.to_string(),
        )))),
    }
}
