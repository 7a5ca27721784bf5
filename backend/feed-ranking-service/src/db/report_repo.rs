use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::ReportStore;
use crate::error::Result;
use crate::models::{NewPostReport, PostId, UserId};

#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn is_excluded_for_viewer(&self, viewer_id: UserId, post_id: PostId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM post_reports
                WHERE reporter_id = $1 AND post_id = $2
            )
            "#,
        )
        .bind(viewer_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn has_recent_report(
        &self,
        viewer_id: UserId,
        post_id: PostId,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM post_reports
                WHERE reporter_id = $1 AND post_id = $2 AND created_at >= $3
            )
            "#,
        )
        .bind(viewer_id)
        .bind(post_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_report(&self, report: &NewPostReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_reports (post_id, reporter_id, reason, status)
            VALUES ($1, $2, $3, 'pending')
            "#,
        )
        .bind(report.post_id)
        .bind(report.reporter_id)
        .bind(&report.reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
