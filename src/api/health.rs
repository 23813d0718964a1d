// Health endpoint - liveness plus pipeline counters

use super::AppState;
use crate::pipeline::MetricsSnapshot;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub open_tabs: usize,
    pub db_path: String,
    pub pipeline: MetricsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        open_tabs: state.pages.open_tabs(),
        db_path: state.pipeline.store().db_path().display().to_string(),
        pipeline: state.pipeline.metrics(),
    })
}
