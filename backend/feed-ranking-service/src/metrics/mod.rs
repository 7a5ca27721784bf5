//! Prometheus metrics for the feed ranking service

use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_ranking_http_requests_total",
        "Total HTTP requests handled by feed-ranking-service",
        &["method", "path", "status"]
    )
    .expect("Failed to register http requests metric")
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_ranking_http_request_duration_seconds",
        "HTTP request latency for feed-ranking-service",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register http duration metric")
});

static FEED_CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_cache_lookups_total",
        "Feed cache lookups by result (hit/miss)",
        &["result"]
    )
    .expect("Failed to register feed cache lookups metric")
});

static FEED_PAGES_SERVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_pages_served_total",
        "Feed pages served by source (cache/live)",
        &["source"]
    )
    .expect("Failed to register feed pages metric")
});

static HOT_SCORE_ENQUEUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hot_score_enqueued_total",
        "Post ids enqueued for hot score recomputation"
    )
    .expect("Failed to register hot score enqueue metric")
});

static WORKER_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_score_worker_runs_total",
        "Hot score worker runs by outcome",
        &["outcome"]
    )
    .expect("Failed to register worker runs metric")
});

static WORKER_ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hot_score_worker_items_total",
        "Posts handled by the hot score worker by result",
        &["result"]
    )
    .expect("Failed to register worker items metric")
});

static WORKER_RUN_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "hot_score_worker_run_duration_seconds",
        "Duration of a hot score worker run",
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    )
    .expect("Failed to register worker duration metric")
});

/// Path label for a request. Unrouted paths share one label so arbitrary
/// URLs cannot grow the series count.
pub fn route_label(pattern: Option<String>) -> String {
    pattern.unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

pub const UNMATCHED_ROUTE: &str = "unmatched";

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let label = if hit { "hit" } else { "miss" };
    FEED_CACHE_LOOKUPS_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_page_served(from_cache: bool) {
    let label = if from_cache { "cache" } else { "live" };
    FEED_PAGES_SERVED_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_enqueued(count: usize) {
    HOT_SCORE_ENQUEUED_TOTAL.inc_by(count as u64);
}

/// Record a worker run outcome (completed/lock_contention/unavailable)
pub fn record_worker_run(outcome: &str, duration: Duration) {
    WORKER_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    WORKER_RUN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record per-post worker results (updated/skipped/failed)
pub fn record_worker_items(result: &str, count: usize) {
    if count > 0 {
        WORKER_ITEMS_TOTAL
            .with_label_values(&[result])
            .inc_by(count as u64);
    }
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
