// Page endpoints - page contexts push snapshots, lifecycle and legacy records

use super::{ApiError, AppState};
use crate::correlation::MessageInfo;
use crate::events::StoredRecord;
use crate::parser::models::TabId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

fn check_tab(tab_id: TabId) -> Result<TabId, ApiError> {
    if tab_id < 0 {
        return Err(ApiError::BadRequest(format!(
            "tab id must be non-negative, got {}",
            tab_id
        )));
    }
    Ok(tab_id)
}

/// Replace a tab's rendered HTML
pub async fn update_page(
    State(state): State<AppState>,
    Path(tab_id): Path<TabId>,
    html: String,
) -> Result<StatusCode, ApiError> {
    let tab_id = check_tab(tab_id)?;
    state
        .pages
        .update_snapshot(tab_id, html)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Tab closed or navigated away
pub async fn close_page(
    State(state): State<AppState>,
    Path(tab_id): Path<TabId>,
) -> Result<StatusCode, ApiError> {
    if state.pages.close(tab_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no page context for tab {}", tab_id)))
    }
}

/// Finished record pushed by a page context, persisted as-is
pub async fn message_info(
    State(state): State<AppState>,
    Path(tab_id): Path<TabId>,
    Json(info): Json<MessageInfo>,
) -> Result<(StatusCode, Json<StoredRecord>), ApiError> {
    tracing::debug!("Tab {} pushed a {} record", tab_id, info.record.kind());
    let stored = state
        .pipeline
        .accept_message_info(info)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(stored)))
}
