use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

/// Liveness endpoint. The service holds no stateful dependencies, so being
/// able to answer is the whole check.
pub async fn health_check() -> impl IntoResponse {
    let uptime_secs = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let body = HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs,
    };

    (StatusCode::OK, Json(body))
}
