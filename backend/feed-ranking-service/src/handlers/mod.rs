use actix_web::web;
use tracing::debug;

use crate::error::AppError;

pub mod feed;
pub mod reports;

pub use feed::get_feed;
pub use reports::{report_post, report_status};

/// Register every route. Shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .route("/health", web::get().to(|| async { "OK" }))
        .route("/api/v1/health/live", web::get().to(|| async { "OK" }))
        .route("/api/v1/health/ready", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .service(get_feed)
        .service(report_post)
        .service(report_status);
}

// Extractor failures use the same `{error, message}` body as handler errors.
// The deserializer's text is logged, never returned.

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        debug!(path = %req.path(), error = %err, "Rejected request body");
        AppError::Validation("Request body must be a valid JSON object".to_string()).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req| {
        debug!(path = %req.path(), error = %err, "Rejected query string");
        AppError::Validation("Invalid query string".to_string()).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req| {
        debug!(path = %req.path(), error = %err, "Rejected path parameter");
        AppError::Validation("post_id must be a positive integer".to_string()).into()
    })
}
