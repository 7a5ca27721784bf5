use async_trait::async_trait;
use sqlx::PgPool;

use super::PostStore;
use crate::error::Result;
use crate::models::{FeedPostRow, FeedQuery, PostId, PostRecord};

/// Repository for post reads and hot score writes
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PostRepository {
    async fn get_post(&self, post_id: PostId) -> Result<Option<PostRecord>> {
        let post = sqlx::query_as::<_, PostRecord>(
            r#"
            SELECT id, like_count, comment_count, share_count, hot_score, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn update_hot_score(&self, post_id: PostId, score: f64) -> Result<bool> {
        let result = sqlx::query("UPDATE posts SET hot_score = $1 WHERE id = $2")
            .bind(score)
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_feed_posts(&self, query: &FeedQuery) -> Result<Vec<FeedPostRow>> {
        // Keyset on id; the ranking order breaks ties by recency then id.
        let rows = sqlx::query_as::<_, FeedPostRow>(
            r#"
            SELECT p.id, u.username AS author, u.profile_picture AS author_avatar,
                   p.content, p.media_ref, p.created_at,
                   p.like_count, p.comment_count, p.share_count, p.hot_score
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE p.visibility = 'public'
              AND NOT EXISTS (
                  SELECT 1 FROM post_reports r
                  WHERE r.post_id = p.id AND r.reporter_id = $1
              )
              AND ($2::BIGINT IS NULL OR p.id < $2)
            ORDER BY p.hot_score DESC, p.created_at DESC, p.id DESC
            LIMIT $3
            "#,
        )
        .bind(query.viewer_id)
        .bind(query.cursor)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
