use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use crate::db::{PostStore, ReportStore, UserDirectory};
use crate::error::{AppError, Result};
use crate::models::{NewPostReport, PostId, UserId};

pub const MAX_REASON_CHARS: usize = 500;

/// A viewer may report the same post again only after this many hours.
pub const REPORT_WINDOW_HOURS: i64 = 24;

#[derive(Clone)]
pub struct ReportService {
    users: Arc<dyn UserDirectory>,
    posts: Arc<dyn PostStore>,
    reports: Arc<dyn ReportStore>,
}

impl ReportService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        posts: Arc<dyn PostStore>,
        reports: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            users,
            posts,
            reports,
        }
    }

    /// Record a pending report. Reported posts drop out of this viewer's feed
    /// once their cached pages expire.
    pub async fn report_post(&self, viewer: &str, post_id: PostId, reason: &str) -> Result<()> {
        let viewer = viewer.trim();
        let reason = reason.trim();
        validate_target(viewer, post_id)?;
        if reason.is_empty() {
            return Err(AppError::Validation("reason is required".to_string()));
        }
        if reason.chars().count() > MAX_REASON_CHARS {
            return Err(AppError::Validation(format!(
                "reason must be at most {} characters",
                MAX_REASON_CHARS
            )));
        }

        let reporter_id = self.resolve_viewer(viewer).await?;
        if self.posts.get_post(post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("post {} not found", post_id)));
        }

        let since = Utc::now() - Duration::hours(REPORT_WINDOW_HOURS);
        if self
            .reports
            .has_recent_report(reporter_id, post_id, since)
            .await?
        {
            return Err(AppError::RateLimited(
                "You have already reported this post in the last 24 hours".to_string(),
            ));
        }

        self.reports
            .create_report(&NewPostReport {
                post_id,
                reporter_id,
                reason: reason.to_string(),
            })
            .await?;

        info!(viewer = %viewer, post_id, "Post reported");
        Ok(())
    }

    /// Whether the viewer has ever reported the post.
    pub async fn report_status(&self, viewer: &str, post_id: PostId) -> Result<bool> {
        let viewer = viewer.trim();
        validate_target(viewer, post_id)?;
        let viewer_id = self.resolve_viewer(viewer).await?;
        self.reports.is_excluded_for_viewer(viewer_id, post_id).await
    }

    async fn resolve_viewer(&self, viewer: &str) -> Result<UserId> {
        self.users
            .resolve_user_id(viewer)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("viewer '{}' not found", viewer)))
    }
}

fn validate_target(viewer: &str, post_id: PostId) -> Result<()> {
    if viewer.is_empty() {
        return Err(AppError::Validation("viewer is required".to_string()));
    }
    if post_id <= 0 {
        return Err(AppError::Validation(
            "post_id must be a positive integer".to_string(),
        ));
    }
    Ok(())
}
