use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::bootstrap::AppState;
use crate::error::Result;
use crate::models::PostId;

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    #[serde(alias = "username")]
    pub viewer: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportStatusParams {
    #[serde(alias = "username")]
    pub viewer: Option<String>,
}

#[post("/api/v1/posts/{post_id}/reports")]
pub async fn report_post(
    state: web::Data<AppState>,
    path: web::Path<PostId>,
    body: web::Json<ReportRequest>,
) -> Result<HttpResponse> {
    let post_id = path.into_inner();
    let viewer = body.viewer.as_deref().unwrap_or_default();
    let reason = body.reason.as_deref().unwrap_or_default();

    state.reports.report_post(viewer, post_id, reason).await?;
    Ok(HttpResponse::Created().json(json!({ "status": "pending" })))
}

#[get("/api/v1/posts/{post_id}/reports/status")]
pub async fn report_status(
    state: web::Data<AppState>,
    path: web::Path<PostId>,
    query: web::Query<ReportStatusParams>,
) -> Result<HttpResponse> {
    let post_id = path.into_inner();
    let viewer = query.viewer.as_deref().unwrap_or_default();

    let already_reported = state.reports.report_status(viewer, post_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "alreadyReported": already_reported })))
}
