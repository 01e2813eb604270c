//! Liveness and tool availability.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ffmpeg: bool,
    pub active_runs: usize,
}

/// GET /api/health
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ffmpeg: ctx.tools.require("ffmpeg").is_ok(),
        active_runs: ctx.scheduler.active_count(),
    })
}
