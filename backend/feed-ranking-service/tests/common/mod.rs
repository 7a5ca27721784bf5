//! In-memory fakes for the store traits, so integration tests need neither
//! PostgreSQL nor Redis.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use feed_ranking::cache::InMemoryFeedCache;
use feed_ranking::db::{LikeStore, PostStore, ReportStore, UserDirectory};
use feed_ranking::error::{AppError, Result};
use feed_ranking::models::{FeedPostRow, FeedQuery, NewPostReport, PostId, PostRecord, UserId};
use feed_ranking::queue::{HotScoreQueue, InMemoryHotScoreQueue};
use feed_ranking::services::{
    FeedService, FeedSettings, FeedStores, PlainMediaResolver, ReportService,
};
use feed_ranking::AppState;

#[derive(Debug, Clone)]
pub struct StoredPost {
    pub id: PostId,
    pub author_id: UserId,
    pub content: String,
    pub media_ref: Option<String>,
    pub visibility: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub hot_score: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredReport {
    pub post_id: PostId,
    pub reporter_id: UserId,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserId>,
    avatars: HashMap<UserId, String>,
    posts: BTreeMap<PostId, StoredPost>,
    likes: HashSet<(UserId, PostId)>,
    reports: Vec<StoredReport>,
    next_user_id: UserId,
    next_post_id: PostId,
}

/// One fake backing every store trait, with failure injection.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    failing_posts: Mutex<HashSet<PostId>>,
    feed_queries: AtomicUsize,
}

fn storage_down() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, username: &str) -> UserId {
        let mut tables = self.tables.lock().unwrap();
        tables.next_user_id += 1;
        let id = tables.next_user_id;
        tables.users.insert(username.to_string(), id);
        id
    }

    pub fn set_avatar(&self, user_id: UserId, path: &str) {
        self.tables
            .lock()
            .unwrap()
            .avatars
            .insert(user_id, path.to_string());
    }

    /// Public post with zero engagement and a zero score.
    pub fn add_post(&self, author_id: UserId, created_at: DateTime<Utc>) -> PostId {
        self.add_post_with(author_id, created_at, |_| {})
    }

    pub fn add_post_with(
        &self,
        author_id: UserId,
        created_at: DateTime<Utc>,
        customize: impl FnOnce(&mut StoredPost),
    ) -> PostId {
        let mut tables = self.tables.lock().unwrap();
        tables.next_post_id += 1;
        let id = tables.next_post_id;
        let mut post = StoredPost {
            id,
            author_id,
            content: format!("post {}", id),
            media_ref: None,
            visibility: "public".to_string(),
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            hot_score: 0.0,
            created_at,
        };
        customize(&mut post);
        tables.posts.insert(id, post);
        id
    }

    pub fn remove_post(&self, post_id: PostId) {
        self.tables.lock().unwrap().posts.remove(&post_id);
    }

    pub fn like(&self, user_id: UserId, post_id: PostId) {
        self.tables.lock().unwrap().likes.insert((user_id, post_id));
    }

    pub fn add_report_at(&self, reporter_id: UserId, post_id: PostId, created_at: DateTime<Utc>) {
        self.tables.lock().unwrap().reports.push(StoredReport {
            post_id,
            reporter_id,
            reason: "spam".to_string(),
            created_at,
        });
    }

    pub fn reports(&self) -> Vec<StoredReport> {
        self.tables.lock().unwrap().reports.clone()
    }

    pub fn hot_score(&self, post_id: PostId) -> Option<f64> {
        self.tables
            .lock()
            .unwrap()
            .posts
            .get(&post_id)
            .map(|p| p.hot_score)
    }

    /// Every store call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// get_post fails for this id only.
    pub fn fail_post(&self, post_id: PostId) {
        self.failing_posts.lock().unwrap().insert(post_id);
    }

    pub fn feed_queries(&self) -> usize {
        self.feed_queries.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(storage_down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn resolve_user_id(&self, identity: &str) -> Result<Option<UserId>> {
        self.check_available()?;
        Ok(self.tables.lock().unwrap().users.get(identity).copied())
    }
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn get_post(&self, post_id: PostId) -> Result<Option<PostRecord>> {
        self.check_available()?;
        if self.failing_posts.lock().unwrap().contains(&post_id) {
            return Err(storage_down());
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .posts
            .get(&post_id)
            .map(|p| PostRecord {
                id: p.id,
                like_count: p.like_count,
                comment_count: p.comment_count,
                share_count: p.share_count,
                hot_score: p.hot_score,
                created_at: p.created_at,
            }))
    }

    async fn update_hot_score(&self, post_id: PostId, score: f64) -> Result<bool> {
        self.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.posts.get_mut(&post_id) {
            Some(post) => {
                post.hot_score = score;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_feed_posts(&self, query: &FeedQuery) -> Result<Vec<FeedPostRow>> {
        self.check_available()?;
        self.feed_queries.fetch_add(1, Ordering::SeqCst);

        let tables = self.tables.lock().unwrap();
        let excluded: HashSet<PostId> = tables
            .reports
            .iter()
            .filter(|r| r.reporter_id == query.viewer_id)
            .map(|r| r.post_id)
            .collect();
        let usernames: HashMap<UserId, &String> =
            tables.users.iter().map(|(name, id)| (*id, name)).collect();

        let mut posts: Vec<&StoredPost> = tables
            .posts
            .values()
            .filter(|p| p.visibility == "public")
            .filter(|p| !excluded.contains(&p.id))
            .filter(|p| query.cursor.map_or(true, |cursor| p.id < cursor))
            .collect();

        posts.sort_by(|a, b| {
            b.hot_score
                .total_cmp(&a.hot_score)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });

        Ok(posts
            .into_iter()
            .take(query.limit.max(0) as usize)
            .map(|p| FeedPostRow {
                id: p.id,
                author: usernames
                    .get(&p.author_id)
                    .map(|name| name.to_string())
                    .unwrap_or_default(),
                author_avatar: tables.avatars.get(&p.author_id).cloned(),
                content: p.content.clone(),
                media_ref: p.media_ref.clone(),
                created_at: p.created_at,
                like_count: p.like_count,
                comment_count: p.comment_count,
                share_count: p.share_count,
                hot_score: p.hot_score,
            })
            .collect())
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn is_excluded_for_viewer(&self, viewer_id: UserId, post_id: PostId) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .reports
            .iter()
            .any(|r| r.reporter_id == viewer_id && r.post_id == post_id))
    }

    async fn has_recent_report(
        &self,
        viewer_id: UserId,
        post_id: PostId,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_available()?;
        Ok(self.tables.lock().unwrap().reports.iter().any(|r| {
            r.reporter_id == viewer_id && r.post_id == post_id && r.created_at >= since
        }))
    }

    async fn create_report(&self, report: &NewPostReport) -> Result<()> {
        self.check_available()?;
        self.tables.lock().unwrap().reports.push(StoredReport {
            post_id: report.post_id,
            reporter_id: report.reporter_id,
            reason: report.reason.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl LikeStore for InMemoryStore {
    async fn batch_is_liked(
        &self,
        viewer_id: UserId,
        post_ids: &[PostId],
    ) -> Result<HashSet<PostId>> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(post_ids
            .iter()
            .copied()
            .filter(|id| tables.likes.contains(&(viewer_id, *id)))
            .collect())
    }
}

/// Queue whose writes always fail; drains return nothing.
pub struct FailingQueue;

#[async_trait]
impl HotScoreQueue for FailingQueue {
    async fn enqueue_many(&self, _post_ids: &[PostId]) -> Result<()> {
        Err(AppError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        ))))
    }

    async fn drain_all(&self) -> Result<HashSet<PostId>> {
        Err(AppError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        ))))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

/// Services wired to in-memory backends.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub queue: Arc<InMemoryHotScoreQueue>,
    pub cache: Arc<InMemoryFeedCache>,
    pub feed: FeedService,
    pub reports: ReportService,
    /// Media root holding [`FIXTURE_MEDIA`]; kept alive for the harness lifetime
    pub media_dir: TempDir,
}

/// The only file present under the harness media root
pub const FIXTURE_MEDIA: &str = "Posts/cat.jpg";

impl Harness {
    pub fn new(page_size: u32) -> Self {
        Self::build(page_size, Duration::from_secs(45), None)
    }

    pub fn with_ttl(page_size: u32, cache_ttl: Duration) -> Self {
        Self::build(page_size, cache_ttl, None)
    }

    /// Same services, but every enqueue fails.
    pub fn with_failing_queue(page_size: u32) -> Self {
        Self::build(page_size, Duration::from_secs(45), Some(Arc::new(FailingQueue)))
    }

    fn build(
        page_size: u32,
        cache_ttl: Duration,
        feed_queue: Option<Arc<dyn HotScoreQueue>>,
    ) -> Self {
        let store = InMemoryStore::new();
        let queue = Arc::new(InMemoryHotScoreQueue::new());
        let cache = Arc::new(InMemoryFeedCache::new());

        let media_dir = TempDir::new().expect("create media dir");
        std::fs::create_dir_all(media_dir.path().join("Posts")).expect("create Posts dir");
        std::fs::write(media_dir.path().join(FIXTURE_MEDIA), b"jpeg").expect("write fixture");

        let feed = FeedService::new(
            FeedStores {
                users: store.clone(),
                posts: store.clone(),
                likes: store.clone(),
            },
            Arc::new(PlainMediaResolver::new(media_dir.path(), "/feed")),
            feed_queue.unwrap_or_else(|| queue.clone() as Arc<dyn HotScoreQueue>),
            cache.clone(),
            FeedSettings {
                page_size,
                cache_ttl,
            },
        );
        let reports = ReportService::new(store.clone(), store.clone(), store.clone());

        Self {
            store,
            queue,
            cache,
            feed,
            reports,
            media_dir,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            feed: self.feed.clone(),
            reports: self.reports.clone(),
        }
    }
}
