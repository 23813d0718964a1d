// Intercept endpoint - receives every request the browser shim observes

use super::AppState;
use crate::parser::models::InterceptedRequest;
use axum::{extract::State, http::StatusCode, Json};

/// Accept one observed request
///
/// Always answers 202 once the body parses; classification happens inline and
/// enrichment + storage continue in the background.
pub async fn intercept(
    State(state): State<AppState>,
    Json(request): Json<InterceptedRequest>,
) -> StatusCode {
    if state.pipeline.ingest(request).is_none() {
        tracing::trace!("Intercepted request is not an audited write");
    }
    StatusCode::ACCEPTED
}
