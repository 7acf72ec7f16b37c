// Prometheus metrics definitions for the chess club backend.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Matches committed by the match recorder.
    pub static ref MATCHES_RECORDED_TOTAL: IntCounter = IntCounter::new(
        "chess_club_matches_recorded_total",
        "Matches recorded",
    )
    .unwrap();

    pub static ref PLAYERS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "chess_club_players_created_total",
        "Players created",
    )
    .unwrap();

    pub static ref PLAYERS_DEACTIVATED_TOTAL: IntCounter = IntCounter::new(
        "chess_club_players_deactivated_total",
        "Players soft-deleted",
    )
    .unwrap();

    pub static ref ARCHIVES_CREATED_TOTAL: IntCounter = IntCounter::new(
        "chess_club_archives_created_total",
        "Monthly archives created",
    )
    .unwrap();

    pub static ref ARCHIVES_DELETED_TOTAL: IntCounter = IntCounter::new(
        "chess_club_archives_deleted_total",
        "Monthly archives deleted",
    )
    .unwrap();

    pub static ref BADGES_AWARDED_TOTAL: IntCounter = IntCounter::new(
        "chess_club_badges_awarded_total",
        "Tournament winner badges awarded",
    )
    .unwrap();

    /// Admin logins rejected for a wrong password.
    pub static ref ADMIN_LOGIN_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "chess_club_admin_login_failures_total",
        "Rejected admin logins",
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chess_club_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "chess_club_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MATCHES_RECORDED_TOTAL.clone()),
        Box::new(PLAYERS_CREATED_TOTAL.clone()),
        Box::new(PLAYERS_DEACTIVATED_TOTAL.clone()),
        Box::new(ARCHIVES_CREATED_TOTAL.clone()),
        Box::new(ARCHIVES_DELETED_TOTAL.clone()),
        Box::new(BADGES_AWARDED_TOTAL.clone()),
        Box::new(ADMIN_LOGIN_FAILURES_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        // Already registered (tests build several routers per process).
        if let Err(e) = REGISTRY.register(c) {
            tracing::debug!("metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Normalize a URL path for metric labels: replace numeric path segments with `:id`
/// to prevent cardinality explosion.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware recording request counts and latency per normalized path.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = normalize_path(req.uri().path());
    let started = Instant::now();

    let response = next.run(req).await;
    let elapsed = started.elapsed();
    tracing::debug!(
        %method,
        %endpoint,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "request"
    );

    API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(elapsed.as_secs_f64());
    response
}
