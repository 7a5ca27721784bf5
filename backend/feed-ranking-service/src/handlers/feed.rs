use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

use crate::bootstrap::AppState;
use crate::error::Result;
use crate::services::parse_cursor;

#[derive(Debug, Deserialize)]
pub struct FeedQueryParams {
    #[serde(alias = "username")]
    pub viewer: Option<String>,
    #[serde(alias = "cursorId")]
    pub cursor: Option<String>,
}

/// GET /api/v1/feed?viewer=<identity>&cursor=<post_id>
#[get("/api/v1/feed")]
pub async fn get_feed(
    state: web::Data<AppState>,
    query: web::Query<FeedQueryParams>,
) -> Result<HttpResponse> {
    let viewer = query.viewer.as_deref().unwrap_or_default();
    let cursor = parse_cursor(query.cursor.as_deref())?;

    let response = state.feed.get_feed_page(viewer, cursor).await?;
    Ok(HttpResponse::Ok().json(response))
}
