// HTTP API module - the daemon's only surface
//
// Three audiences share one router:
// - the browser shim posts every observed request to /api/intercept
// - page contexts push HTML snapshots and tab lifecycle under /api/pages
// - the side-panel UI reads /api/logs and follows /api/logs/stream
//
// Binds to 127.0.0.1 by default (localhost only).

mod health;
mod intercept;
mod logs;
mod pages;

use crate::correlation::PageRegistry;
use crate::pipeline::AuditPipeline;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Rendered Slack pages are far larger than axum's default body limit
const MAX_SNAPSHOT_BYTES: usize = 32 * 1024 * 1024;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AuditPipeline>,
    pub pages: Arc<PageRegistry>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<AuditPipeline>, pages: Arc<PageRegistry>) -> Self {
        Self {
            pipeline,
            pages,
            started_at: Utc::now(),
        }
    }
}

/// API error responses
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        if status.is_server_error() {
            tracing::error!("API error: {} - {}", status, message);
        } else {
            tracing::debug!("API error: {} - {}", status, message);
        }

        (status, message).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/intercept", post(intercept::intercept))
        .route("/api/logs", get(logs::get_logs))
        .route("/api/logs/stream", get(logs::stream_logs))
        .route(
            "/api/pages/:tab_id",
            put(pages::update_page)
                .delete(pages::close_page)
                .layer(DefaultBodyLimit::max(MAX_SNAPSHOT_BYTES)),
        )
        .route("/api/pages/:tab_id/message-info", post(pages::message_info))
        .route("/api/health", get(health::health))
        .with_state(state)
}

/// Serve the API until the shutdown signal fires
pub async fn start_server(
    bind_addr: SocketAddr,
    state: AppState,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        })
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}
