//! Feed assembly: cache lookup, ranked query, per-viewer enrichment and
//! hot-score enqueue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::cache::{FeedCache, FeedCacheKey};
use crate::db::{LikeStore, PostStore, UserDirectory};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{FeedPage, FeedPost, FeedQuery, FeedResponse, PostId};
use crate::queue::HotScoreQueue;
use crate::services::media::{MediaResolver, DEFAULT_MEDIA_URL};

/// Shown for authors who never uploaded a profile picture.
pub const DEFAULT_AVATAR: &str = "default-profile.png";

#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub page_size: u32,
    pub cache_ttl: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            cache_ttl: crate::cache::DEFAULT_FEED_TTL,
        }
    }
}

/// Storage collaborators read while building a page
#[derive(Clone)]
pub struct FeedStores {
    pub users: Arc<dyn UserDirectory>,
    pub posts: Arc<dyn PostStore>,
    pub likes: Arc<dyn LikeStore>,
}

#[derive(Clone)]
pub struct FeedService {
    stores: FeedStores,
    media: Arc<dyn MediaResolver>,
    queue: Arc<dyn HotScoreQueue>,
    cache: Arc<dyn FeedCache>,
    settings: FeedSettings,
}

impl FeedService {
    pub fn new(
        stores: FeedStores,
        media: Arc<dyn MediaResolver>,
        queue: Arc<dyn HotScoreQueue>,
        cache: Arc<dyn FeedCache>,
        settings: FeedSettings,
    ) -> Self {
        Self {
            stores,
            media,
            queue,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> FeedSettings {
        self.settings
    }

    /// One page of the viewer's feed, newest page first when `cursor` is `None`.
    pub async fn get_feed_page(&self, viewer: &str, cursor: Option<PostId>) -> Result<FeedResponse> {
        let viewer = viewer.trim();
        if viewer.is_empty() {
            return Err(AppError::Validation("viewer is required".to_string()));
        }
        if let Some(cursor) = cursor {
            if cursor <= 0 {
                return Err(AppError::Validation(
                    "cursor must be a positive integer".to_string(),
                ));
            }
        }

        let key = FeedCacheKey::new(viewer, cursor);
        if let Some(page) = self.cache.get(&key).await {
            metrics::record_cache_lookup(true);
            metrics::record_page_served(true);
            debug!(viewer = %viewer, cursor = ?cursor, "Serving feed page from cache");
            return Ok(FeedResponse::from_page(page, true));
        }
        metrics::record_cache_lookup(false);

        let start = Instant::now();
        let page = self
            .build_page(viewer, cursor)
            .await
            .map_err(|e| {
                if e.is_storage() {
                    error!(viewer = %viewer, cursor = ?cursor, error = %e, "Feed query failed");
                }
                e
            })?;

        self.cache.set(&key, &page, self.settings.cache_ttl).await;
        metrics::record_page_served(false);
        debug!(
            viewer = %viewer,
            cursor = ?cursor,
            posts = page.posts.len(),
            next_cursor = ?page.next_cursor,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built feed page"
        );

        Ok(FeedResponse::from_page(page, false))
    }

    async fn build_page(&self, viewer: &str, cursor: Option<PostId>) -> Result<FeedPage> {
        let viewer_id = self
            .stores
            .users
            .resolve_user_id(viewer)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("viewer '{}' not found", viewer)))?;

        let rows = self
            .stores
            .posts
            .list_feed_posts(&FeedQuery {
                viewer_id,
                cursor,
                limit: i64::from(self.settings.page_size),
            })
            .await?;

        let post_ids: Vec<PostId> = rows.iter().map(|row| row.id).collect();
        let liked = self.stores.likes.batch_is_liked(viewer_id, &post_ids).await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let media_url = self.media_url(row.media_ref.as_deref()).await;
            posts.push(FeedPost {
                is_liked: liked.contains(&row.id),
                id: row.id,
                author: row.author,
                author_avatar: author_avatar(row.author_avatar),
                content: row.content,
                media_url,
                created_at: row.created_at,
                like_count: row.like_count,
                comment_count: row.comment_count,
                share_count: row.share_count,
            });
        }

        self.enqueue_for_rescoring(&post_ids).await;

        let next_cursor = if post_ids.len() == self.settings.page_size as usize {
            post_ids.last().copied()
        } else {
            None
        };

        Ok(FeedPage { posts, next_cursor })
    }

    async fn media_url(&self, media_ref: Option<&str>) -> String {
        match media_ref.map(str::trim).filter(|r| !r.is_empty()) {
            Some(media_ref) => self
                .media
                .resolve(media_ref)
                .await
                .unwrap_or_else(|| DEFAULT_MEDIA_URL.to_string()),
            None => DEFAULT_MEDIA_URL.to_string(),
        }
    }

    async fn enqueue_for_rescoring(&self, post_ids: &[PostId]) {
        if post_ids.is_empty() {
            return;
        }
        match self.queue.enqueue_many(post_ids).await {
            Ok(()) => metrics::record_enqueued(post_ids.len()),
            Err(e) => warn!(
                count = post_ids.len(),
                error = %e,
                "Failed to enqueue posts for hot score update"
            ),
        }
    }
}

fn author_avatar(stored: Option<String>) -> String {
    match stored {
        Some(path) if !path.trim().is_empty() => path,
        _ => DEFAULT_AVATAR.to_string(),
    }
}

/// Parse the optional `cursor` query parameter; blank counts as absent.
pub fn parse_cursor(raw: Option<&str>) -> Result<Option<PostId>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<PostId>() {
        Ok(cursor) if cursor > 0 => Ok(Some(cursor)),
        _ => Err(AppError::Validation(format!(
            "cursor must be a positive integer, got '{}'",
            raw
        ))),
    }
}
