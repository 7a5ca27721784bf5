use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;

use super::LikeStore;
use crate::error::Result;
use crate::models::{PostId, UserId};

#[derive(Clone)]
pub struct LikeRepository {
    pool: PgPool,
}

impl LikeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeStore for LikeRepository {
    async fn batch_is_liked(
        &self,
        viewer_id: UserId,
        post_ids: &[PostId],
    ) -> Result<HashSet<PostId>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let liked: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT post_id FROM post_likes
            WHERE user_id = $1 AND post_id = ANY($2)
            "#,
        )
        .bind(viewer_id)
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(liked.into_iter().collect())
    }
}
