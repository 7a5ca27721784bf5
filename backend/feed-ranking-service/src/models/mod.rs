use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PostId = i64;
pub type UserId = i64;

/// Counters and creation time the hot-score worker needs for one post.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PostRecord {
    pub id: PostId,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub hot_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Row returned by the ranked feed query, before per-viewer enrichment.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FeedPostRow {
    pub id: PostId,
    pub author: String,
    pub author_avatar: Option<String>,
    pub content: String,
    pub media_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub hot_score: f64,
}

/// Keyset page request handed to the post store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    pub viewer_id: UserId,
    /// Only posts with an id strictly below the cursor are returned.
    pub cursor: Option<PostId>,
    pub limit: i64,
}

/// A post as rendered in a viewer's feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    pub id: PostId,
    pub author: String,
    pub author_avatar: String,
    pub content: String,
    pub media_url: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub is_liked: bool,
}

/// Cached unit: one rendered page plus the cursor for the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub next_cursor: Option<PostId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub posts: Vec<FeedPost>,
    pub next_cursor: Option<PostId>,
    pub cached: bool,
}

impl FeedResponse {
    pub fn from_page(page: FeedPage, cached: bool) -> Self {
        Self {
            posts: page.posts,
            next_cursor: page.next_cursor,
            cached,
        }
    }
}

/// Report of a post by a viewer, pending moderation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostReport {
    pub post_id: PostId,
    pub reporter_id: UserId,
    pub reason: String,
}
